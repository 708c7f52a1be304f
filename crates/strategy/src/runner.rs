use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{Bar, BarField, BarSource, Notifier, Result, Shutdown, Signal};
use store::{BarTailer, HistoricSource, LiveSource};

use crate::engine::BracketEngine;
use crate::gaps::GapMonitor;

/// Totals of a replay or follow session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub bars: u64,
    pub signals: u64,
    pub notified: u64,
    pub trade_count: u32,
    pub total_profit: Decimal,
    pub max_gap: Option<chrono::Duration>,
    pub last_close: Option<Decimal>,
    pub last_bar_at: Option<DateTime<Utc>>,
}

/// Sequential consumer for one ticker: every bar goes through the live
/// source, the gap monitor and the engine, in arrival order. Signals are
/// printed, and live ones are sent to each recipient.
pub struct SignalRunner {
    engine: BracketEngine,
    source: LiveSource,
    gaps: GapMonitor,
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
    bars: u64,
    signals: u64,
    notified: u64,
}

impl SignalRunner {
    pub fn new(engine: BracketEngine, notifier: Arc<dyn Notifier>, recipients: Vec<String>) -> Self {
        Self {
            engine,
            source: LiveSource::default(),
            gaps: GapMonitor::default(),
            notifier,
            recipients,
            bars: 0,
            signals: 0,
            notified: 0,
        }
    }

    pub fn engine(&self) -> &BracketEngine {
        &self.engine
    }

    pub fn source(&self) -> &LiveSource {
        &self.source
    }

    pub fn summary(&self) -> RunSummary {
        let state = self.engine.state();
        RunSummary {
            bars: self.bars,
            signals: self.signals,
            notified: self.notified,
            trade_count: state.trade_count(),
            total_profit: state.total_profit(),
            max_gap: self.gaps.max_gap(),
            last_close: self.source.latest_bar_value(self.engine.ticker(), BarField::Close),
            last_bar_at: self.source.latest_bar_time(self.engine.ticker()),
        }
    }

    /// Process one bar as of `now`.
    pub async fn handle(&mut self, bar: Bar, now: DateTime<Utc>) -> Option<Signal> {
        let ticker = self.engine.ticker().to_string();
        self.bars += 1;
        self.gaps.observe(&ticker, &bar);
        let signal = self.engine.on_bar(&bar, now);
        self.source.push(&ticker, bar);

        let signal = signal?;
        self.signals += 1;
        let line = self.describe(&signal);
        println!("{line}");
        if !signal.is_entry() {
            println!("Total profit: {} [{} trades]", signal.total_profit, signal.trade_count);
        }

        if signal.live {
            self.notify(&signal, &line).await;
        }
        Some(signal)
    }

    /// Drive the engine from a tailer until shutdown.
    pub async fn follow(&mut self, tailer: &mut BarTailer, shutdown: &mut Shutdown) -> Result<RunSummary> {
        info!(ticker = %self.engine.ticker(), path = %tailer.path().display(), "Following bar log");
        while let Some(bar) = tailer.next_bar_or_shutdown(shutdown).await? {
            self.handle(bar, Utc::now()).await;
        }
        Ok(self.summary())
    }

    /// Drive the engine from preloaded bars until they run out.
    pub async fn replay(&mut self, source: &mut HistoricSource) -> RunSummary {
        let ticker = self.engine.ticker().to_string();
        loop {
            let before = source.remaining(&ticker);
            if !source.update_bars() {
                break;
            }
            if source.remaining(&ticker) == before {
                continue;
            }
            if let Some(bar) = source.latest_bar(&ticker).cloned() {
                self.handle(bar, Utc::now()).await;
            }
        }
        self.summary()
    }

    fn describe(&self, signal: &Signal) -> String {
        let tz = self.engine.params().session.timezone();
        let at = signal.at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S");
        match signal.profit {
            None => format!("**{} {} {at}, close: {}", signal.side, signal.ticker, signal.price),
            Some(profit) => format!(
                "**{} {} {at}, close: {}, profit: {profit}, total_profit: {}",
                signal.side, signal.ticker, signal.price, signal.total_profit
            ),
        }
    }

    async fn notify(&mut self, signal: &Signal, body: &str) {
        let subject = format!("{} {}", signal.side, signal.ticker);
        for recipient in &self.recipients {
            match self.notifier.notify(recipient, &subject, body).await {
                Ok(()) => self.notified += 1,
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Failed to deliver signal notification");
                }
            }
        }
    }
}
