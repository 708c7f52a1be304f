use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a bar is still accumulating ticks or has been finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarStatus {
    Open,
    Closed,
}

impl BarStatus {
    /// Map the provider's `BarStatus` string. Only `"Open"` is still forming;
    /// every other (terminal) status means the minute is finalized.
    pub fn from_provider(status: &str) -> Self {
        if status == "Open" {
            BarStatus::Open
        } else {
            BarStatus::Closed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BarStatus::Open => "Open",
            BarStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for BarStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-minute OHLCV bar with its tick-volume breakdown.
///
/// Bars are immutable once decoded. `received_at` is the wall-clock instant
/// the bar was captured, and is the ordering key for every freshness check
/// downstream. `bar_time` is the provider's own minute stamp, when it sent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub received_at: DateTime<Utc>,
    pub bar_time: Option<DateTime<Utc>>,
    pub status: BarStatus,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub total_volume: u64,
    pub up_volume: u64,
    pub down_volume: u64,
    pub total_ticks: u64,
    pub up_ticks: u64,
    pub down_ticks: u64,
    pub unchanged_ticks: u64,
    pub unchanged_volume: u64,
}

impl Bar {
    pub fn is_open(&self) -> bool {
        self.status == BarStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == BarStatus::Closed
    }

    /// Close above open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }
}

/// Side of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction of an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side of the order that opens a trade in this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// Side of the order that closes a trade in this direction.
    pub fn exit_side(&self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Entry or exit emitted by the strategy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub ticker: String,
    pub side: OrderSide,
    /// Close of the bar that triggered the signal.
    pub price: Decimal,
    /// Receipt time of the triggering bar.
    pub at: DateTime<Utc>,
    /// Realized profit of the trade this signal closed. `None` on entries.
    pub profit: Option<Decimal>,
    pub total_profit: Decimal,
    pub trade_count: u32,
    /// True when the triggering bar is fresh enough to be notified.
    /// Signals produced while catching up a backlog are recorded but not live.
    pub live: bool,
}

impl Signal {
    pub fn is_entry(&self) -> bool {
        self.profit.is_none()
    }
}
