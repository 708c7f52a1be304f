use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use common::{shutdown_channel, Error, Result, Shutdown, ShutdownTrigger};
use store::BarLog;

use crate::auth::TokenProvider;
use crate::connector::StreamConnector;
use crate::ingestor::{IngestStats, StreamIngestor};
use crate::retry::RetryPolicy;

/// Settings shared by every ingestor a supervisor starts.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub bars_dir: PathBuf,
    pub backlog: u32,
    pub retry: RetryPolicy,
}

/// Runs one `StreamIngestor` per ticker and stops them all together.
pub struct Supervisor {
    trigger: ShutdownTrigger,
    tasks: JoinSet<(String, Result<IngestStats>)>,
}

impl Supervisor {
    pub fn start(
        tickers: &[String],
        settings: IngestSettings,
        connector: Arc<dyn StreamConnector>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let (trigger, shutdown) = shutdown_channel();
        let mut tasks = JoinSet::new();

        info!(tickers = ?tickers, bars_dir = %settings.bars_dir.display(), "Starting bar ingestors");
        for ticker in tickers {
            let ingestor = StreamIngestor::new(
                ticker.clone(),
                settings.backlog,
                Arc::clone(&connector),
                Arc::clone(&tokens),
                BarLog::new(settings.bars_dir.clone()),
                shutdown.clone(),
            )
            .with_retry_policy(settings.retry.clone());

            let ticker = ticker.clone();
            tasks.spawn(async move { (ticker, ingestor.run().await) });
        }

        Self { trigger, tasks }
    }

    pub fn shutdown_signal(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next ingestor to stop on its own, normally because of a
    /// fatal error. `None` once every ingestor has stopped.
    pub async fn next_exit(&mut self) -> Option<(String, Result<IngestStats>)> {
        let joined = self.tasks.join_next().await?;
        Some(flatten(joined))
    }

    /// Signal every ingestor to stop and wait for all of them.
    pub async fn shutdown(mut self) -> Vec<(String, Result<IngestStats>)> {
        info!(running = self.tasks.len(), "Stopping bar ingestors");
        self.trigger.trigger();

        let mut reports = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            reports.push(flatten(joined));
        }
        reports
    }
}

fn flatten(
    joined: std::result::Result<(String, Result<IngestStats>), tokio::task::JoinError>,
) -> (String, Result<IngestStats>) {
    match joined {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Ingestor task panicked");
            ("<unknown>".to_string(), Err(Error::Other(format!("ingestor task failed: {e}"))))
        }
    }
}
