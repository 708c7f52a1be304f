use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::config::split_list;
use common::{Config, StreamConfig};
use feed::{HttpConnector, IngestSettings, RetryPolicy, StaticToken, Supervisor};

/// Stream one-minute bars for each ticker into the day-rotating bar log.
#[derive(Parser)]
#[command(name = "barsd")]
struct Cli {
    /// Comma-separated tickers, e.g. ESH24,NQH24,YMH24.
    tickers: String,

    /// Root of the bar log tree. Defaults to BARS_DIR, then ./bars.
    #[arg(long)]
    bars_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let tickers = split_list(&cli.tickers);
    if tickers.is_empty() {
        bail!("No tickers given, expected e.g. ESH24,NQH24");
    }

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let stream_cfg = StreamConfig::from_env().context("Loading stream settings")?;
    let bars_dir = cli.bars_dir.unwrap_or(cfg.bars_dir);
    info!(tickers = ?tickers, bars_dir = %bars_dir.display(), "barsd starting");

    // ── Ingestors ─────────────────────────────────────────────────────────────
    let connector = Arc::new(HttpConnector::new(&stream_cfg)?);
    let tokens = Arc::new(StaticToken::new(stream_cfg.access_token.clone()));
    let settings = IngestSettings {
        bars_dir,
        backlog: stream_cfg.backlog,
        retry: RetryPolicy::default(),
    };
    let mut supervisor = Supervisor::start(&tickers, settings, connector, tokens);

    let mut failed = Vec::new();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutdown requested");
                break;
            }
            exit = supervisor.next_exit() => match exit {
                Some((ticker, Ok(stats))) => {
                    info!(ticker = %ticker, stats = ?stats, "Ingestor stopped");
                }
                Some((ticker, Err(e))) => {
                    error!(ticker = %ticker, error = %e, "Ingestor failed");
                    failed.push(ticker);
                }
                None => {
                    warn!("No ingestors left running");
                    break;
                }
            },
        }
    }

    for (ticker, report) in supervisor.shutdown().await {
        match report {
            Ok(stats) => info!(ticker = %ticker, stats = ?stats, "Ingestor stopped"),
            Err(e) => {
                error!(ticker = %ticker, error = %e, "Ingestor failed during shutdown");
                failed.push(ticker);
            }
        }
    }

    if !failed.is_empty() {
        bail!("Ingestion failed for {}", failed.join(","));
    }
    info!("barsd stopped");
    Ok(())
}
