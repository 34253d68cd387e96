//! Error types for the rate table, its source and the conversion engine.

use thiserror::Error;

/// Failures while acquiring a rates snapshot from the remote page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body read failure.
    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP error: {status} for URL: {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The page did not contain a usable rates table.
    #[error("Failed to parse rates page: {0}")]
    Parse(String),
}

/// Errors surfaced by the rate table and conversion operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateError {
    #[error("Currency not found: {0}")]
    CurrencyNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// Rates must be finite and strictly positive.
    #[error("Invalid rate {value} for {code}")]
    InvalidRate { code: String, value: f64 },

    #[error("Rate table is already initialized")]
    AlreadyInitialized,

    #[error("Rate table is not initialized")]
    NotInitialized,
}

pub type RateResult<T> = Result<T, RateError>;
