use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{shutdown_channel, Config};
use store::barlog::path_for;
use store::source::DEFAULT_MAX_ROWS;
use store::{BarTailer, HistoricSource, TailMode};
use strategy::{BracketEngine, RunSummary, SignalRunner, StrategyFileConfig};

/// Replay a ticker's bar log through the bracket strategy, then keep
/// following it as the ingestor appends.
#[derive(Parser)]
#[command(name = "replay")]
struct Cli {
    /// Ticker whose log to read, e.g. ESH24.
    ticker: String,

    /// Day of the log: YYYYMMDD or YYYY-MM-DD.
    date: String,

    /// Stop at the end of the file instead of following it.
    #[arg(long, default_value_t = false)]
    no_follow: bool,

    /// Root of the bar log tree. Defaults to BARS_DIR, then ./bars.
    #[arg(long)]
    bars_dir: Option<PathBuf>,

    /// Strategy parameters (TOML). Defaults to STRATEGY_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();
    let day = parse_day(&cli.date)?;
    let bars_dir = cli.bars_dir.clone().unwrap_or_else(|| cfg.bars_dir.clone());

    let file_cfg = match cli.config.as_ref().or(cfg.strategy_config_path.as_ref()) {
        Some(path) => StrategyFileConfig::load(path)?,
        None => StrategyFileConfig::default(),
    };
    let params = file_cfg.params()?;

    let path = path_for(&bars_dir, &cli.ticker, day);
    if !path.exists() {
        bail!("Bar log {} does not exist", path.display());
    }
    println!("Retrieving data for {} on {}", cli.ticker, day);

    let engine = BracketEngine::new(cli.ticker.clone(), params);
    let mut runner = SignalRunner::new(engine, notify::from_config(&cfg), cfg.notify_recipients.clone());

    let summary = if cli.no_follow {
        let mut source = HistoricSource::load(&bars_dir, &[cli.ticker.clone()], day, DEFAULT_MAX_ROWS).await?;
        runner.replay(&mut source).await
    } else {
        let mut tailer = BarTailer::open(&path, TailMode::Replay)
            .await
            .with_context(|| format!("Opening {}", path.display()))?;
        let (trigger, mut shutdown) = shutdown_channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    trigger.trigger();
                }
                Err(e) => {
                    warn!(error = %e, "Failed to listen for Ctrl+C, follow until killed");
                    std::future::pending::<()>().await;
                }
            }
        });
        let summary = runner.follow(&mut tailer, &mut shutdown).await?;
        if tailer.truncations() > 0 {
            info!(truncations = tailer.truncations(), "Bar log was truncated while following");
        }
        summary
    };

    print_summary(&cli.ticker, &summary);
    Ok(())
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .with_context(|| format!("Invalid date '{raw}', expected YYYYMMDD"))
}

fn print_summary(ticker: &str, summary: &RunSummary) {
    println!(
        "{ticker}: {} bars, {} trades, total profit {}",
        summary.bars, summary.trade_count, summary.total_profit
    );
    if let (Some(close), Some(at)) = (summary.last_close, summary.last_bar_at) {
        println!("Last bar: close {close} at {at}");
    }
    if let Some(gap) = summary.max_gap {
        println!("Longest gap between closed bars: {}s", gap.num_seconds());
    }
}
