use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use common::{Error, Result, Shutdown};
use store::BarLog;

use crate::auth::TokenProvider;
use crate::codec::{decode, Decoded, SkipReason};
use crate::connector::{LineStream, StreamConnector, StreamFailure, StreamRequest};
use crate::retry::RetryPolicy;

/// Where an ingestor is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Connecting,
    Streaming,
    Reconnecting,
    Closing,
}

/// Counters reported when an ingestor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub bars_written: u64,
    pub skipped: u64,
    pub undecodable: u64,
    pub reconnects: u64,
}

enum StreamEnd {
    Shutdown,
    Failed(StreamFailure),
}

/// Streams one ticker's bars from the provider into its bar log.
///
/// Transport trouble of any kind is retried forever on the `RetryPolicy`
/// schedule. Only a token failure or a failed log write stops the ingestor
/// with an error; shutdown stops it cleanly. The bar log is closed on every
/// exit path.
pub struct StreamIngestor {
    ticker: String,
    backlog: u32,
    connector: Arc<dyn StreamConnector>,
    tokens: Arc<dyn TokenProvider>,
    log: BarLog,
    retry: RetryPolicy,
    shutdown: Shutdown,
    state: IngestState,
    stats: IngestStats,
}

impl StreamIngestor {
    pub fn new(
        ticker: impl Into<String>,
        backlog: u32,
        connector: Arc<dyn StreamConnector>,
        tokens: Arc<dyn TokenProvider>,
        log: BarLog,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            backlog,
            connector,
            tokens,
            log,
            retry: RetryPolicy::default(),
            shutdown,
            state: IngestState::Connecting,
            stats: IngestStats::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Run until shutdown or a fatal error. Call this inside a `tokio::spawn`.
    pub async fn run(mut self) -> Result<IngestStats> {
        info!(ticker = %self.ticker, backlog = self.backlog, "Starting bar stream");
        let result = self.run_loop().await;

        self.set_state(IngestState::Closing);
        if let Err(e) = self.log.close().await {
            warn!(ticker = %self.ticker, error = %e, "Failed to close bar log");
        }

        match &result {
            Ok(()) => info!(ticker = %self.ticker, stats = ?self.stats, "Bar stream stopped"),
            Err(e) => error!(ticker = %self.ticker, error = %e, stats = ?self.stats, "Bar stream failed"),
        }
        result.map(|()| self.stats)
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }
            self.set_state(IngestState::Connecting);

            let token = match self.tokens.access_token().await {
                Ok(token) => token,
                Err(Error::Auth(msg)) => return Err(Error::Auth(msg)),
                Err(e) => return Err(Error::Auth(e.to_string())),
            };
            let request = StreamRequest {
                ticker: self.ticker.clone(),
                barsback: self.backlog,
                token,
            };

            let connector = Arc::clone(&self.connector);
            let connected = tokio::select! {
                _ = self.shutdown.triggered() => return Ok(()),
                connected = connector.connect(&request) => connected,
            };

            let failure = match connected {
                Ok(mut lines) => {
                    info!(ticker = %self.ticker, barsback = request.barsback, "Bar stream connected");
                    self.set_state(IngestState::Streaming);
                    match self.stream(lines.as_mut()).await? {
                        StreamEnd::Shutdown => return Ok(()),
                        StreamEnd::Failed(failure) => failure,
                    }
                }
                Err(failure) => failure,
            };

            self.set_state(IngestState::Reconnecting);
            self.stats.reconnects += 1;

            let retry = self.retry.next_delay();
            if retry.escalate {
                error!(
                    ticker = %self.ticker,
                    failure = %failure,
                    attempts = retry.attempt,
                    "Bar stream keeps failing, still retrying"
                );
            } else {
                warn!(
                    ticker = %self.ticker,
                    failure = %failure,
                    backoff = ?retry.delay,
                    attempt = retry.attempt,
                    "Bar stream error, reconnecting"
                );
            }

            tokio::select! {
                _ = self.shutdown.triggered() => return Ok(()),
                _ = tokio::time::sleep(retry.delay) => {}
            }
        }
    }

    async fn stream(&mut self, lines: &mut dyn LineStream) -> Result<StreamEnd> {
        let mut healthy = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => return Ok(StreamEnd::Shutdown),
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(StreamEnd::Failed(StreamFailure::Ended)),
                Err(failure) => return Ok(StreamEnd::Failed(failure)),
            };

            if !line.trim().is_empty() && self.handle_line(&line).await? && !healthy {
                healthy = true;
                self.retry.reset();
            }

            tokio::task::yield_now().await;
        }
    }

    /// Returns true when the line was a well-formed provider message.
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        // Microsecond precision, the resolution of the log's time_received.
        let received_at = Utc::now().trunc_subsecs(6);

        match decode(line, received_at) {
            Ok(Decoded::Bar(bar)) => {
                let path = self.log.append(&self.ticker, &bar).await?;
                self.stats.bars_written += 1;
                debug!(
                    ticker = %self.ticker,
                    status = %bar.status,
                    close = %bar.close,
                    path = %path.display(),
                    "Wrote bar"
                );
                Ok(true)
            }
            Ok(Decoded::Skip(reason)) => {
                self.stats.skipped += 1;
                if reason != SkipReason::Heartbeat {
                    debug!(ticker = %self.ticker, reason = ?reason, "Skipping message");
                }
                Ok(true)
            }
            Err(e) => {
                self.stats.undecodable += 1;
                warn!(ticker = %self.ticker, error = %e, "Dropping undecodable message");
                Ok(false)
            }
        }
    }

    fn set_state(&mut self, state: IngestState) {
        if self.state != state {
            debug!(ticker = %self.ticker, from = ?self.state, to = ?state, "Ingest state change");
            self.state = state;
        }
    }
}
