pub mod cli;
pub mod converter;
pub mod core;
pub mod providers;
pub mod refresher;

use crate::converter::ConversionEngine;
use crate::core::config::AppConfig;
use crate::core::{RateSource, RateTable};
use crate::providers::XRatesSource;
use crate::refresher::Refresher;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const STARTUP_RETRY_DELAY: Duration = Duration::from_millis(500);

pub enum AppCommand {
    List,
    Convert {
        from: String,
        to: String,
        amount: String,
        swap: bool,
    },
    Watch {
        from: String,
        to: String,
        amount: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("WorldCoins starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let base = config.base.record();
    let source: Arc<dyn RateSource> = Arc::new(XRatesSource::new(&config.source, base.clone())?);

    let table = cli::ui::with_spinner(
        "Loading exchange rates...",
        RateTable::bootstrap(
            source.as_ref(),
            base,
            config.startup_retries,
            STARTUP_RETRY_DELAY,
        ),
    )
    .await
    .with_context(|| format!("Failed to load initial exchange rates from {}", config.source.url))?;
    let table = Arc::new(table);
    let engine = ConversionEngine::new(Arc::clone(&table));

    match command {
        AppCommand::List => cli::list::run(&table),
        AppCommand::Convert {
            from,
            to,
            amount,
            swap,
        } => cli::convert::run(&engine, &from, &to, &amount, swap),
        AppCommand::Watch { from, to, amount } => {
            let refresher = Refresher::new(source, table, config.refresh_interval());
            cli::watch::run(refresher, &engine, &from, &to, &amount).await
        }
    }
}
