pub mod util;
pub mod x_rates;

pub use x_rates::XRatesSource;
