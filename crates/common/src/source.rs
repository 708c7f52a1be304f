use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::Bar;

/// Scalar column of a bar, for `BarSource::latest_bar_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Bar {
    pub fn value(&self, field: BarField) -> Decimal {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => Decimal::from(self.total_volume),
        }
    }
}

/// Read access to the most recent bars of each ticker.
///
/// Historic (log replay) and live (tailed) feeds both implement this, so a
/// consumer never needs to know which one it is reading from.
pub trait BarSource {
    fn latest_bar(&self, ticker: &str) -> Option<&Bar>;

    /// Up to `n` most recent bars, oldest first. Fewer when less are known.
    fn latest_bars(&self, ticker: &str, n: usize) -> &[Bar];

    fn latest_bar_time(&self, ticker: &str) -> Option<DateTime<Utc>> {
        self.latest_bar(ticker).map(|b| b.received_at)
    }

    fn latest_bar_value(&self, ticker: &str, field: BarField) -> Option<Decimal> {
        self.latest_bar(ticker).map(|b| b.value(field))
    }
}
