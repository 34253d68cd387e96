use super::{convert, ui};
use crate::converter::{ConversionEngine, parse_amount};
use crate::refresher::Refresher;
use anyhow::{Context, Result};
use std::future::Future;
use tracing::{info, warn};

fn current_line(engine: &ConversionEngine, from: &str, to: &str, amount: f64) -> Result<String> {
    let conversion = engine.conversion(from, to, amount)?;
    Ok(format!(
        "{}  {}",
        convert::render(&conversion),
        ui::style_text(&ui::last_updated_label(conversion.updated_at), ui::StyleType::Subtle)
    ))
}

/// Keeps a conversion on screen, re-emitting it every time a refresh lands, until `stop` resolves.
pub async fn watch_until<F>(
    refresher: Refresher,
    engine: &ConversionEngine,
    from: &str,
    to: &str,
    amount: &str,
    stop: F,
    mut emit: impl FnMut(String),
) -> Result<()>
where
    F: Future,
{
    let amount = parse_amount(amount)?;
    // Unknown currencies are reported before anything is scheduled
    emit(current_line(engine, from, to, amount).with_context(|| format!("Cannot convert {from} to {to}"))?);

    let handle = refresher.spawn();
    let mut updates = handle.subscribe();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                match current_line(engine, from, to, amount) {
                    Ok(line) => emit(line),
                    Err(e) => {
                        warn!(error = %e, "Conversion unavailable in latest rates");
                        emit(ui::style_text(&e.to_string(), ui::StyleType::Error));
                    }
                }
            }
        }
    }

    info!("Stopping refresher");
    handle.shutdown().await;
    Ok(())
}

pub async fn run(refresher: Refresher, engine: &ConversionEngine, from: &str, to: &str, amount: &str) -> Result<()> {
    watch_until(
        refresher,
        engine,
        from,
        to,
        amount,
        tokio::signal::ctrl_c(),
        |line| println!("{line}"),
    )
    .await
}
