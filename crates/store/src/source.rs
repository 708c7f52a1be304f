use std::collections::{HashMap, VecDeque};
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use common::{Bar, BarSource, Error, Result};

use crate::barlog::path_for;
use crate::tailer::read_bars;

/// Rows kept per ticker before the oldest are dropped.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Per-ticker rolling window of the latest bars, oldest first.
///
/// Up to twice `max_rows` bars are held so the oldest half can be dropped
/// in one drain instead of shifting the window on every push.
#[derive(Debug)]
struct BarWindow {
    bars: HashMap<String, Vec<Bar>>,
    max_rows: usize,
}

impl BarWindow {
    fn new(max_rows: usize) -> Self {
        Self {
            bars: HashMap::new(),
            max_rows: max_rows.max(1),
        }
    }

    fn push(&mut self, ticker: &str, bar: Bar) {
        let history = self.bars.entry(ticker.to_string()).or_default();
        history.push(bar);
        if history.len() >= self.max_rows * 2 {
            let excess = history.len() - self.max_rows;
            history.drain(..excess);
        }
    }

    fn latest(&self, ticker: &str) -> Option<&Bar> {
        self.bars.get(ticker).and_then(|b| b.last())
    }

    fn latest_n(&self, ticker: &str, n: usize) -> &[Bar] {
        match self.bars.get(ticker) {
            Some(history) => &history[history.len().saturating_sub(n.min(self.max_rows))..],
            None => &[],
        }
    }
}

/// Bars fed in as they arrive, typically from a `BarTailer`.
#[derive(Debug)]
pub struct LiveSource {
    window: BarWindow,
}

impl LiveSource {
    pub fn new(max_rows: usize) -> Self {
        Self {
            window: BarWindow::new(max_rows),
        }
    }

    pub fn push(&mut self, ticker: &str, bar: Bar) {
        self.window.push(ticker, bar);
    }
}

impl Default for LiveSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROWS)
    }
}

impl BarSource for LiveSource {
    fn latest_bar(&self, ticker: &str) -> Option<&Bar> {
        self.window.latest(ticker)
    }

    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar] {
        self.window.latest_n(ticker, n)
    }
}

/// Bars loaded up front from existing logs and released one step at a time,
/// so a recorded day can be pushed through the same consumer as a live feed.
#[derive(Debug)]
pub struct HistoricSource {
    tickers: Vec<String>,
    pending: HashMap<String, VecDeque<Bar>>,
    window: BarWindow,
}

impl HistoricSource {
    /// Load the logs of `tickers` for `day` under `root`.
    /// Fails with `LogFileMissing` if any of them does not exist.
    pub async fn load(root: &Path, tickers: &[String], day: NaiveDate, max_rows: usize) -> Result<Self> {
        let mut source = Self {
            tickers: Vec::new(),
            pending: HashMap::new(),
            window: BarWindow::new(max_rows),
        };

        for ticker in tickers {
            let path = path_for(root, ticker, day);
            if !path.exists() {
                return Err(Error::LogFileMissing(path));
            }
            let bars = read_bars(&path).await?;
            info!(ticker = %ticker, bars = bars.len(), path = %path.display(), "Loaded historic bars");
            source.add(ticker, bars);
        }
        Ok(source)
    }

    pub fn from_bars(ticker: &str, bars: Vec<Bar>) -> Self {
        let mut source = Self {
            tickers: Vec::new(),
            pending: HashMap::new(),
            window: BarWindow::new(DEFAULT_MAX_ROWS),
        };
        source.add(ticker, bars);
        source
    }

    fn add(&mut self, ticker: &str, bars: Vec<Bar>) {
        self.tickers.push(ticker.to_string());
        self.pending.insert(ticker.to_string(), bars.into());
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Bars of `ticker` not yet released.
    pub fn remaining(&self, ticker: &str) -> usize {
        self.pending.get(ticker).map_or(0, VecDeque::len)
    }

    /// Release the next bar of every ticker that still has one.
    /// Returns false once every ticker is exhausted.
    pub fn update_bars(&mut self) -> bool {
        let mut advanced = false;
        for ticker in &self.tickers {
            if let Some(bar) = self.pending.get_mut(ticker).and_then(|q| q.pop_front()) {
                self.window.push(ticker, bar);
                advanced = true;
            }
        }
        advanced
    }
}

impl BarSource for HistoricSource {
    fn latest_bar(&self, ticker: &str) -> Option<&Bar> {
        self.window.latest(ticker)
    }

    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar] {
        self.window.latest_n(ticker, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::{BarField, BarStatus};
    use rust_decimal::Decimal;

    fn bar(minute: i64, close: i64) -> Bar {
        Bar {
            received_at: Utc.with_ymd_and_hms(2024, 2, 14, 15, 0, 0).unwrap()
                + Duration::minutes(minute),
            bar_time: None,
            status: BarStatus::Closed,
            open: Decimal::from(close),
            high: Decimal::from(close + 1),
            low: Decimal::from(close - 1),
            close: Decimal::from(close),
            total_volume: 7,
            up_volume: 4,
            down_volume: 3,
            total_ticks: 7,
            up_ticks: 4,
            down_ticks: 3,
            unchanged_ticks: 0,
            unchanged_volume: 0,
        }
    }

    #[test]
    fn live_source_keeps_bounded_window() {
        let mut source = LiveSource::new(3);
        for i in 0..5 {
            source.push("ES", bar(i, 100 + i));
        }
        let bars = source.latest_bars("ES", 10);
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].close, Decimal::from(102));
        assert_eq!(source.latest_bar_value("ES", BarField::Close), Some(Decimal::from(104)));
        assert_eq!(source.latest_bar_value("ES", BarField::Volume), Some(Decimal::from(7)));
        assert!(source.latest_bar("NQ").is_none());
        assert!(source.latest_bars("NQ", 2).is_empty());
    }

    #[test]
    fn window_storage_stays_bounded() {
        let mut source = LiveSource::new(4);
        for i in 0..100 {
            source.push("ES", bar(i, i));
            let stored = source.window.bars.get("ES").map_or(0, Vec::len);
            assert!(stored < 8, "{stored} bars held after {} pushes", i + 1);
            let visible = source.latest_bars("ES", 100);
            assert_eq!(visible.len(), (i as usize + 1).min(4));
            assert_eq!(visible.last().map(|b| b.close), Some(Decimal::from(i)));
        }
        let closes: Vec<_> = source.latest_bars("ES", 4).iter().map(|b| b.close).collect();
        assert_eq!(closes, (96..100).map(Decimal::from).collect::<Vec<_>>());
    }

    #[test]
    fn historic_source_advances_one_bar_per_step() {
        let mut source = HistoricSource::from_bars("ES", vec![bar(0, 100), bar(1, 101)]);
        assert!(source.latest_bar("ES").is_none());
        assert_eq!(source.remaining("ES"), 2);

        assert!(source.update_bars());
        assert_eq!(source.remaining("ES"), 1);
        assert_eq!(source.latest_bar("ES").map(|b| b.close), Some(Decimal::from(100)));
        assert!(source.update_bars());
        assert_eq!(source.latest_bars("ES", 2).len(), 2);
        assert_eq!(
            source.latest_bar_time("ES"),
            Some(Utc.with_ymd_and_hms(2024, 2, 14, 15, 1, 0).unwrap())
        );
        assert!(!source.update_bars());
    }

    #[tokio::test]
    async fn historic_load_reports_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let err = HistoricSource::load(dir.path(), &["ES".to_string()], day, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LogFileMissing(_)));
    }
}
