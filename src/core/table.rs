//! The shared table of latest exchange rates.
//!
//! The table publishes immutable [`RateSnapshot`]s behind an `Arc`. Readers
//! clone the current `Arc` and work against it, so a concurrent [`RateTable::replace`]
//! is either entirely visible to them or not at all.

use crate::core::currency::{CurrencyCode, RateRecord, RateSource, Rates};
use crate::core::error::{FetchError, RateError, RateResult};
use crate::providers::util::with_retry;
use chrono::{DateTime, Utc};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// One complete, internally consistent set of rates.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    rates: Rates,
    updated_at: DateTime<Utc>,
    generation: u64,
}

impl RateSnapshot {
    fn new(rates: Rates, generation: u64) -> Self {
        Self {
            rates,
            updated_at: Utc::now(),
            generation,
        }
    }

    /// Looks up a currency by code, ignoring case and surrounding whitespace.
    pub fn get(&self, code: &str) -> RateResult<&RateRecord> {
        let code = code.trim();
        self.rates
            .get(code.to_ascii_uppercase().as_str())
            .ok_or_else(|| RateError::CurrencyNotFound(code.to_string()))
    }

    /// Looks up a currency by its display name, e.g. `"Euro"`.
    pub fn find_by_name(&self, name: &str) -> Option<&RateRecord> {
        let name = name.trim();
        self.rates
            .values()
            .find(|record| record.name.eq_ignore_ascii_case(name))
    }

    /// Accepts either a code or a display name.
    pub fn resolve(&self, code_or_name: &str) -> RateResult<&RateRecord> {
        self.get(code_or_name).or_else(|err| {
            self.find_by_name(code_or_name).ok_or(err)
        })
    }

    /// All records ordered by code.
    pub fn list(&self) -> Vec<RateRecord> {
        let mut records: Vec<RateRecord> = self.rates.values().cloned().collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));
        records
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Starts at 1 for the initial load and increases by one per replace.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Thread-safe holder of the current [`RateSnapshot`].
pub struct RateTable {
    base: RateRecord,
    current: OnceLock<RwLock<Arc<RateSnapshot>>>,
}

impl RateTable {
    /// Creates an empty table. Nothing can be read from it until [`RateTable::initialize`].
    pub fn new(base: RateRecord) -> Self {
        Self {
            base,
            current: OnceLock::new(),
        }
    }

    /// Fetches the first snapshot and returns an initialized table.
    ///
    /// The fetch is retried `retries` times with `delay` in between. If every
    /// attempt fails the last error is returned and no table is built.
    pub async fn bootstrap<S>(
        source: &S,
        base: RateRecord,
        retries: usize,
        delay: Duration,
    ) -> Result<Self, FetchError>
    where
        S: RateSource + ?Sized,
    {
        let rates = with_retry(|| source.fetch_rates(), retries, delay).await?;
        let table = Self::new(base);
        let snapshot = RateSnapshot::new(table.with_base(rates), 1);
        info!(currencies = snapshot.len(), "Rate table initialized");
        table.current.get_or_init(|| RwLock::new(Arc::new(snapshot)));
        Ok(table)
    }

    /// Publishes the first snapshot. Fails if the table already holds one.
    pub fn initialize(&self, rates: Rates) -> RateResult<()> {
        let snapshot = RateSnapshot::new(self.with_base(rates), 1);
        let currencies = snapshot.len();
        self.current
            .set(RwLock::new(Arc::new(snapshot)))
            .map_err(|_| RateError::AlreadyInitialized)?;
        info!(currencies, "Rate table initialized");
        Ok(())
    }

    /// Swaps in a complete new snapshot and stamps it with the current time.
    ///
    /// Currencies missing from `rates` disappear, except the base currency,
    /// which is always kept.
    pub fn replace(&self, rates: Rates) -> RateResult<Arc<RateSnapshot>> {
        let slot = self.current.get().ok_or(RateError::NotInitialized)?;
        let rates = self.with_base(rates);

        let mut current = slot.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(RateSnapshot::new(rates, current.generation + 1));
        *current = Arc::clone(&next);
        drop(current);

        debug!(
            generation = next.generation,
            currencies = next.len(),
            "Rate table replaced"
        );
        Ok(next)
    }

    /// The current snapshot. Hold on to it to make several consistent reads.
    pub fn snapshot(&self) -> RateResult<Arc<RateSnapshot>> {
        let slot = self.current.get().ok_or(RateError::NotInitialized)?;
        let current = slot.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(&current))
    }

    pub fn get(&self, code: &str) -> RateResult<RateRecord> {
        self.snapshot()?.get(code).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> RateResult<Option<RateRecord>> {
        Ok(self.snapshot()?.find_by_name(name).cloned())
    }

    pub fn list(&self) -> RateResult<Vec<RateRecord>> {
        Ok(self.snapshot()?.list())
    }

    pub fn last_updated_at(&self) -> RateResult<DateTime<Utc>> {
        Ok(self.snapshot()?.updated_at())
    }

    pub fn is_initialized(&self) -> bool {
        self.current.get().is_some()
    }

    pub fn base(&self) -> &RateRecord {
        &self.base
    }

    fn with_base(&self, mut rates: Rates) -> Rates {
        if !rates.contains_key(&self.base.code) {
            rates.insert(self.base.code.clone(), self.base.clone());
        }
        rates
    }
}
