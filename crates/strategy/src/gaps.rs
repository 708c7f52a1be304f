use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use common::Bar;

/// Gap between two consecutive closed bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapReport {
    pub gap: Duration,
    /// The gap is the longest seen so far.
    pub new_max: bool,
    /// The gap exceeds the threshold, so at least one minute is likely missing.
    pub over_threshold: bool,
}

/// Watches the spacing of closed bars for holes in the feed.
#[derive(Debug, Clone)]
pub struct GapMonitor {
    threshold: Duration,
    last_closed: Option<DateTime<Utc>>,
    max_gap: Option<Duration>,
    over_threshold: u64,
}

impl GapMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_closed: None,
            max_gap: None,
            over_threshold: 0,
        }
    }

    pub fn max_gap(&self) -> Option<Duration> {
        self.max_gap
    }

    pub fn gaps_over_threshold(&self) -> u64 {
        self.over_threshold
    }

    /// Record a bar. Only closed bars are measured.
    pub fn observe(&mut self, ticker: &str, bar: &Bar) -> Option<GapReport> {
        if !bar.is_closed() {
            return None;
        }
        let previous = self.last_closed.replace(bar.received_at)?;
        let gap = bar.received_at - previous;

        let new_max = self.max_gap.map_or(true, |max| gap > max);
        if new_max {
            self.max_gap = Some(gap);
            info!(ticker = %ticker, gap_secs = gap.num_seconds(), at = %bar.received_at, "New longest gap between closed bars");
        }

        let over_threshold = gap > self.threshold;
        if over_threshold {
            self.over_threshold += 1;
            warn!(ticker = %ticker, gap_secs = gap.num_seconds(), at = %bar.received_at, "Closed bars further apart than expected");
        }

        Some(GapReport {
            gap,
            new_max,
            over_threshold,
        })
    }
}

impl Default for GapMonitor {
    fn default() -> Self {
        Self::new(Duration::seconds(70))
    }
}
