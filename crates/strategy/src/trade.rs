use rust_decimal::Decimal;

use common::{Bar, Direction};

/// Fixed exit distances from the entry close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    /// Distance in the trade's favour that takes profit.
    pub up: Decimal,
    /// Distance against the trade that stops it out.
    pub down: Decimal,
}

impl Default for Bracket {
    fn default() -> Self {
        Self {
            up: Decimal::from(2),
            down: Decimal::from(4),
        }
    }
}

/// An open position, entered at the close of `entry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub entry: Bar,
    pub direction: Direction,
}

impl Trade {
    pub fn new(entry: Bar, direction: Direction) -> Self {
        Self { entry, direction }
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry.close
    }

    /// Price move since entry, positive when it favours the trade.
    /// `None` when the move does not fit in a `Decimal`.
    pub fn profit(&self, bar: &Bar) -> Option<Decimal> {
        match self.direction {
            Direction::Long => bar.close.checked_sub(self.entry.close),
            Direction::Short => self.entry.close.checked_sub(bar.close),
        }
    }

    /// Whether `bar` has reached either side of the bracket.
    pub fn should_exit(&self, bar: &Bar, bracket: &Bracket) -> bool {
        self.profit(bar)
            .is_some_and(|profit| profit >= bracket.up || -profit >= bracket.down)
    }
}
