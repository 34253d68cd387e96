//! Core rate table abstractions

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod table;

// Re-export main types for cleaner imports
pub use currency::{CurrencyCode, RateRecord, RateSource, Rates};
pub use error::{FetchError, RateError, RateResult};
pub use table::{RateSnapshot, RateTable};
