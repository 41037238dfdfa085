use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use liqtrack::config::Config;
use liqtrack::market_data::adapters::kalshi::KalshiClient;
use liqtrack::persist::sqlite::SqliteStore;
use liqtrack::scheduler::Scheduler;
use liqtrack::telemetry;

/// Adaptive liquidity snapshot collector for binary event markets.
#[derive(Parser, Debug)]
#[command(name = "liqtrack", version)]
struct Cli {
    /// Single pass: refresh the tracked set, collect everything due, exit.
    #[arg(long)]
    once: bool,

    /// Debug logging (scheduling behavior is unaffected).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let cli = Cli::parse();

    telemetry::init_tracing(if cli.verbose { "liqtrack=debug" } else { "liqtrack=info" });
    telemetry::init_metrics();

    let config = Config::from_env()?;

    if let Some(dir) = Path::new(&config.db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let store = SqliteStore::connect(&config.db_path).await?;
    let client = KalshiClient::new(
        config.base_url.clone(),
        config.series_ticker.clone(),
        config.http_timeout(),
    )?;

    let mut scheduler = Scheduler::new(
        Arc::new(client),
        Arc::new(store),
        config.cadence(),
        config.refresh_interval(),
    );

    // Initial discovery pass before either run mode.
    let now = Utc::now();
    scheduler.reconcile(now).await;

    if scheduler.is_empty() {
        warn!(series = %config.series_ticker, "no active markets found");
    } else {
        info!(tracked = scheduler.tracked_len(), "tracking markets");
        for market in scheduler.tracked_markets() {
            info!(
                event = %market.event_ticker,
                matchup = %market.matchup(),
                close = %market.close_time,
                "tracked market"
            );
        }
    }

    if cli.once {
        scheduler.run_once(Utc::now()).await;
    } else {
        scheduler.run_forever().await;
    }

    Ok(())
}
