//! Terminal front end over the rate table and conversion engine.

pub mod convert;
pub mod list;
pub mod setup;
pub mod ui;
pub mod watch;
