//! MOA — Korean-market holdings tracker.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the snapshot store, and runs the daily refresh loop with
//! graceful shutdown. The dashboard and the Telegram notifier run as
//! background tasks over the same store and event stream.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use moa::config::{self, AppConfig};
use moa::dashboard;
use moa::dashboard::routes::DashboardState;
use moa::engine::scheduler::UpdateScheduler;
use moa::notify::TelegramNotifier;
use moa::providers::krx::KrxStockSource;
use moa::providers::pension::PensionEtfSource;
use moa::providers::QuoteSource;
use moa::store::SnapshotStore;
use moa::types::TrackerError;

const BANNER: &str = r#"
  __  __  ___    _
 |  \/  |/ _ \  / \
 | |\/| | | | |/ _ \
 | |  | | |_| / ___ \
 |_|  |_|\___/_/   \_\

  모아 — 국내주식 · 연금저축 ETF 트래커
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");

    let close = config::close_time_parts(&cfg.tracker.market_close)
        .context("invalid market close time")?;

    info!(
        tracker = %cfg.tracker.name,
        market_close = %cfg.tracker.market_close,
        poll_interval_secs = cfg.tracker.poll_interval_secs,
        domestic = cfg.holdings.domestic.len(),
        pension = cfg.holdings.pension.len(),
        "MOA starting up"
    );

    // -- Open the snapshot store ------------------------------------------

    let store = Arc::new(
        SnapshotStore::open(&cfg.store.db_path)
            .await
            .context("failed to open snapshot store")?,
    );

    // -- Quote sources -----------------------------------------------------

    let mut sources: Vec<Arc<dyn QuoteSource>> = Vec::new();

    if cfg.sources.krx.enabled {
        sources.push(Arc::new(
            KrxStockSource::new(&cfg.sources, cfg.holdings.domestic.clone(), close)
                .context("failed to build KRX source")?,
        ));
    }
    if cfg.sources.pension.enabled {
        sources.push(Arc::new(
            PensionEtfSource::new(&cfg.sources, cfg.holdings.pension.clone(), close)
                .context("failed to build pension ETF source")?,
        ));
    }
    anyhow::ensure!(!sources.is_empty(), "no quote sources enabled");

    let scheduler = Arc::new(UpdateScheduler::new(sources, Arc::clone(&store), close));

    // -- Consumers ---------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(Arc::clone(&store)));
        dashboard::spawn_dashboard(state, cfg.dashboard.port)?;
    }

    if let Some(notifier) = TelegramNotifier::from_config(&cfg.alerts)? {
        let events = scheduler.subscribe();
        tokio::spawn(notifier.run(events));
    }

    // -- Refresh loop ------------------------------------------------------

    // First run on an empty store: sync immediately rather than waiting
    // for the next close boundary.
    if store.latest(None).await?.is_none() {
        info!("Empty store — running initial refresh");
        run_trigger(&scheduler, true).await;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.tracker.poll_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        poll_interval_secs = cfg.tracker.poll_interval_secs,
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_trigger(&scheduler, false).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("MOA shut down cleanly.");
    Ok(())
}

/// Run one trigger attempt, reducing outcomes to log lines. A no-op tick
/// (already refreshed today) stays quiet; failures never end the loop.
async fn run_trigger(scheduler: &UpdateScheduler, force: bool) {
    match scheduler.trigger(force).await {
        Ok(Some(report)) => info!(%report, "Refresh finished"),
        Ok(None) => {}
        Err(TrackerError::CycleInProgress) => {
            warn!("Refresh already running, skipping tick");
        }
        Err(e) => {
            error!(error = %e, "Refresh failed — will retry on next tick");
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("moa=info"));

    let json_logging = std::env::var("MOA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
