//! Currency abstractions

use crate::core::error::{FetchError, RateError, RateResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// A three letter currency identifier such as `USD`, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> RateResult<Self> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.len() == 3 && normalized.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(normalized))
        } else {
            Err(RateError::InvalidCurrencyCode(code.to_string()))
        }
    }

    /// For known-good literals only.
    pub(crate) fn from_static(code: &'static str) -> Self {
        debug_assert!(Self::new(code).is_ok_and(|c| c.as_str() == code));
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

// Lets `Rates` be queried with a plain `&str`.
impl Borrow<str> for CurrencyCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One currency's value expressed against the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub name: String,
    /// Units of this currency per one unit of the base currency.
    pub value_in_base: f64,
    pub code: CurrencyCode,
}

impl RateRecord {
    pub fn new(name: impl Into<String>, value_in_base: f64, code: CurrencyCode) -> RateResult<Self> {
        if !value_in_base.is_finite() || value_in_base <= 0.0 {
            return Err(RateError::InvalidRate {
                code: code.to_string(),
                value: value_in_base,
            });
        }
        Ok(Self {
            name: name.into(),
            value_in_base,
            code,
        })
    }

    /// The record of the reference currency, valued at exactly 1.0.
    pub fn base(name: impl Into<String>, code: CurrencyCode) -> Self {
        Self {
            name: name.into(),
            value_in_base: 1.0,
            code,
        }
    }
}

/// A complete set of rates as returned by a single fetch.
pub type Rates = HashMap<CurrencyCode, RateRecord>;

/// Produces a full snapshot of currently known rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<Rates, FetchError>;
}
