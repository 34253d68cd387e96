//! Currency conversion over the latest rate snapshot.

use crate::core::currency::CurrencyCode;
use crate::core::error::{RateError, RateResult};
use crate::core::table::{RateSnapshot, RateTable};
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Parses a user supplied amount such as `"12.5"`.
pub fn parse_amount(input: &str) -> RateResult<f64> {
    let amount: f64 = input
        .trim()
        .parse()
        .map_err(|_| RateError::InvalidAmount(input.to_string()))?;
    ensure_finite(amount)
}

fn ensure_finite(amount: f64) -> RateResult<f64> {
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(RateError::InvalidAmount(amount.to_string()))
    }
}

/// Units of `to` per unit of `from` within a single snapshot.
pub fn ratio(snapshot: &RateSnapshot, from: &str, to: &str) -> RateResult<f64> {
    let from = snapshot.get(from)?;
    let to = snapshot.get(to)?;
    Ok(to.value_in_base / from.value_in_base)
}

/// Converts `amount` and returns its magnitude; the sign of the input is discarded.
///
/// A result too large to represent is reported as an invalid amount.
pub fn convert(snapshot: &RateSnapshot, from: &str, to: &str, amount: f64) -> RateResult<f64> {
    let amount = ensure_finite(amount)?;
    let result = (amount * ratio(snapshot, from, to)?).abs();
    if result.is_finite() {
        Ok(result)
    } else {
        Err(RateError::InvalidAmount(format!(
            "{amount} {from} overflows when converted to {to}"
        )))
    }
}

/// The outcome of one conversion, in the shape a front end displays it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub amount: f64,
    pub result: f64,
    /// When the rates used for this conversion were fetched.
    pub updated_at: DateTime<Utc>,
}

impl Conversion {
    /// Exchanges both the currencies and the amounts.
    pub fn swapped(&self) -> Self {
        Conversion {
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.result,
            result: self.amount,
            updated_at: self.updated_at,
        }
    }
}

impl Display for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} {} = {:.2} {}",
            self.amount, self.from, self.result, self.to
        )
    }
}

/// Stateless conversions against whatever snapshot the table holds at call time.
///
/// Every call takes exactly one snapshot, so both sides of a conversion are
/// always read from the same set of rates even while a refresh is running.
#[derive(Clone)]
pub struct ConversionEngine {
    table: Arc<RateTable>,
}

impl ConversionEngine {
    pub fn new(table: Arc<RateTable>) -> Self {
        Self { table }
    }

    pub fn ratio(&self, from: &str, to: &str) -> RateResult<f64> {
        let snapshot = self.table.snapshot()?;
        ratio(&snapshot, from, to)
    }

    pub fn convert(&self, from: &str, to: &str, amount: f64) -> RateResult<f64> {
        let snapshot = self.table.snapshot()?;
        convert(&snapshot, from, to, amount)
    }

    pub fn convert_str(&self, from: &str, to: &str, amount: &str) -> RateResult<f64> {
        self.convert(from, to, parse_amount(amount)?)
    }

    /// Like [`ConversionEngine::convert`], but `from` and `to` may also be display names.
    pub fn conversion(&self, from: &str, to: &str, amount: f64) -> RateResult<Conversion> {
        let amount = ensure_finite(amount)?;
        let snapshot = self.table.snapshot()?;
        let from = snapshot.resolve(from)?.code.clone();
        let to = snapshot.resolve(to)?.code.clone();
        let result = convert(&snapshot, from.as_str(), to.as_str(), amount)?;
        debug!(%from, %to, amount, result, generation = snapshot.generation(), "Converted");
        Ok(Conversion {
            from,
            to,
            amount,
            result,
            updated_at: snapshot.updated_at(),
        })
    }

    pub fn table(&self) -> &Arc<RateTable> {
        &self.table
    }
}
