//! Background refresh of the rate table.

use crate::core::currency::RateSource;
use crate::core::table::RateTable;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Updated { generation: u64, currencies: usize },
    /// The table was left on its previous snapshot.
    Failed(String),
}

// Clears the fetching flag even when the cycle future is dropped mid-fetch.
struct FetchingGuard<'a>(&'a AtomicBool);

impl<'a> FetchingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FetchingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn state_of(fetching: &AtomicBool) -> RefreshState {
    if fetching.load(Ordering::SeqCst) {
        RefreshState::Fetching
    } else {
        RefreshState::Idle
    }
}

/// Periodically pulls a fresh snapshot from a [`RateSource`] into a [`RateTable`].
pub struct Refresher {
    source: Arc<dyn RateSource>,
    table: Arc<RateTable>,
    period: Duration,
    fetching: Arc<AtomicBool>,
    updates: watch::Sender<u64>,
}

impl Refresher {
    pub fn new(source: Arc<dyn RateSource>, table: Arc<RateTable>, period: Duration) -> Self {
        let generation = table.snapshot().map(|s| s.generation()).unwrap_or_default();
        let (updates, _) = watch::channel(generation);
        Self {
            source,
            table,
            period,
            fetching: Arc::new(AtomicBool::new(false)),
            updates,
        }
    }

    pub fn state(&self) -> RefreshState {
        state_of(&self.fetching)
    }

    /// Receives the generation of every snapshot this refresher publishes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Runs a single fetch and applies it. Failures are logged and absorbed.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _fetching = FetchingGuard::enter(&self.fetching);

        let rates = match self.source.fetch_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                warn!(error = %e, "Rate refresh failed, keeping previous snapshot");
                return CycleOutcome::Failed(e.to_string());
            }
        };

        match self.table.replace(rates) {
            Ok(snapshot) => {
                info!(
                    generation = snapshot.generation(),
                    currencies = snapshot.len(),
                    "Rates refreshed"
                );
                self.updates.send_replace(snapshot.generation());
                CycleOutcome::Updated {
                    generation: snapshot.generation(),
                    currencies: snapshot.len(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Rate refresh could not be applied");
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    /// Starts the refresh loop on the current tokio runtime.
    ///
    /// The first cycle runs one period from now. The loop keeps going until
    /// [`RefresherHandle::shutdown`] is called or the handle is dropped.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetching = Arc::clone(&self.fetching);
        let updates = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        RefresherHandle {
            shutdown: shutdown_tx,
            task: Some(task),
            fetching,
            updates,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // `interval` rejects a zero period
        let period = self.period.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?period, "Refresher started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!("Shutdown requested mid-fetch, abandoning cycle");
                            break;
                        }
                        _ = self.run_cycle() => {}
                    }
                }
            }
        }

        info!("Refresher stopped");
    }
}

/// Owns the running refresh task. Dropping it stops the loop.
pub struct RefresherHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    fetching: Arc<AtomicBool>,
    updates: watch::Receiver<u64>,
}

impl RefresherHandle {
    pub fn state(&self) -> RefreshState {
        state_of(&self.fetching)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stops scheduling cycles and waits for the task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Refresher task ended abnormally");
            }
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::{CurrencyCode, RateRecord, Rates};
    use crate::core::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    enum Behavior {
        Succeed,
        FailFirst(usize),
        AlwaysFail,
        Hang,
    }

    struct ScriptedSource {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn eur_rates(value: f64) -> Rates {
        let code = CurrencyCode::new("EUR").unwrap();
        let record = RateRecord::new("Euro", value, code.clone()).unwrap();
        Rates::from([(code, record)])
    }

    #[async_trait]
    impl RateSource for ScriptedSource {
        async fn fetch_rates(&self) -> Result<Rates, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let value = 1.0 + call as f64;
            match self.behavior {
                Behavior::Succeed => Ok(eur_rates(value)),
                Behavior::FailFirst(n) if call >= n => Ok(eur_rates(value)),
                Behavior::FailFirst(_) | Behavior::AlwaysFail => {
                    Err(FetchError::Parse("rates table not found".to_string()))
                }
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn table() -> Arc<RateTable> {
        let table = RateTable::new(RateRecord::base(
            "US Dollar",
            CurrencyCode::new("USD").unwrap(),
        ));
        table.initialize(eur_rates(0.9)).unwrap();
        Arc::new(table)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_successful_cycle_replaces_table() {
        let table = table();
        let refresher = Refresher::new(
            ScriptedSource::new(Behavior::Succeed),
            Arc::clone(&table),
            Duration::from_secs(30),
        );
        let before = table.last_updated_at().unwrap();

        let outcome = refresher.run_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::Updated {
                generation: 2,
                currencies: 2
            }
        );
        assert_eq!(table.get("EUR").unwrap().value_in_base, 1.0);
        assert!(table.last_updated_at().unwrap() >= before);
        assert_eq!(*refresher.subscribe().borrow(), 2);
        assert_eq!(refresher.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_snapshot() {
        let table = table();
        let refresher = Refresher::new(
            ScriptedSource::new(Behavior::FailFirst(1)),
            Arc::clone(&table),
            Duration::from_secs(30),
        );
        let before_updated = table.last_updated_at().unwrap();
        let before_list = table.list().unwrap();

        let outcome = refresher.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed(ref msg) if msg.contains("rates table not found")));
        assert_eq!(table.last_updated_at().unwrap(), before_updated);
        assert_eq!(table.list().unwrap(), before_list);
        assert_eq!(table.get("EUR").unwrap().value_in_base, 0.9);
        assert_eq!(refresher.state(), RefreshState::Idle);

        // The next successful cycle moves the timestamp forward
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(matches!(refresher.run_cycle().await, CycleOutcome::Updated { .. }));
        assert!(table.last_updated_at().unwrap() > before_updated);
    }

    #[tokio::test]
    async fn test_loop_refreshes_periodically_and_shuts_down() {
        let table = table();
        let source = ScriptedSource::new(Behavior::Succeed);
        let handle = Refresher::new(source.clone(), Arc::clone(&table), Duration::from_millis(20)).spawn();

        wait_for(|| table.snapshot().unwrap().generation() >= 3).await;
        handle.shutdown().await;

        let calls = source.calls();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls(), calls, "no cycles after shutdown");
    }

    #[tokio::test]
    async fn test_loop_survives_failures() {
        let table = table();
        let source = ScriptedSource::new(Behavior::FailFirst(3));
        let handle = Refresher::new(source.clone(), Arc::clone(&table), Duration::from_millis(10)).spawn();
        let mut updates = handle.subscribe();

        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .expect("no update published")
            .unwrap();

        assert!(source.calls() >= 4);
        assert!(*updates.borrow() >= 2);
        assert!(table.snapshot().unwrap().generation() >= 2);
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_always_failing_source_never_touches_table() {
        let table = table();
        let before = table.snapshot().unwrap();
        let source = ScriptedSource::new(Behavior::AlwaysFail);
        let handle = Refresher::new(source.clone(), Arc::clone(&table), Duration::from_millis(5)).spawn();

        wait_for(|| source.calls() >= 5).await;
        handle.shutdown().await;

        let after = table.snapshot().unwrap();
        assert_eq!(after.generation(), before.generation());
        assert_eq!(after.updated_at(), before.updated_at());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_fetch() {
        let table = table();
        let source = ScriptedSource::new(Behavior::Hang);
        let handle = Refresher::new(source.clone(), Arc::clone(&table), Duration::from_millis(5)).spawn();

        wait_for(|| handle.state() == RefreshState::Fetching).await;

        let fetching = Arc::clone(&handle.fetching);
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown blocked on the in-flight fetch");

        assert_eq!(state_of(&fetching), RefreshState::Idle);
        assert_eq!(table.snapshot().unwrap().generation(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_loop() {
        let table = table();
        let source = ScriptedSource::new(Behavior::Succeed);
        let handle = Refresher::new(source.clone(), Arc::clone(&table), Duration::from_millis(10)).spawn();

        wait_for(|| source.calls() >= 1).await;
        drop(handle);
        // Let an already-started cycle finish
        tokio::time::sleep(Duration::from_millis(30)).await;

        let calls = source.calls();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls(), calls);
    }
}
