use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use common::{Bar, Direction, OrderSide, Signal};

use crate::config::EngineParams;
use crate::trade::Trade;

/// Closed bars kept for the entry test.
const MAX_CLOSED_BARS: usize = 500;

/// Everything the bracket strategy knows about one ticker's session.
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    closed: Vec<Bar>,
    /// Latest snapshot of the minute still forming.
    forming: Option<Bar>,
    /// Consecutive up-ticks seen in the forming minute.
    up_tick_run: u64,
    trade: Option<Trade>,
    total_profit: Decimal,
    trade_count: u32,
    bars_seen: u64,
    out_of_session: u64,
}

impl StrategyState {
    pub fn closed_bars(&self) -> &[Bar] {
        &self.closed
    }

    pub fn forming(&self) -> Option<&Bar> {
        self.forming.as_ref()
    }

    pub fn up_tick_run(&self) -> u64 {
        self.up_tick_run
    }

    pub fn trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    pub fn in_position(&self) -> bool {
        self.trade.is_some()
    }

    pub fn total_profit(&self) -> Decimal {
        self.total_profit
    }

    pub fn trade_count(&self) -> u32 {
        self.trade_count
    }

    pub fn bars_seen(&self) -> u64 {
        self.bars_seen
    }

    pub fn out_of_session(&self) -> u64 {
        self.out_of_session
    }
}

/// Long-only bracket strategy for a single ticker.
///
/// Flat, it enters long on a forming bar when the last `up_bars` closed
/// bars were up-bars and the forming minute shows a run of at least
/// `up_ticks` consecutive up-ticks. In a position, every bar is checked
/// against the bracket and the trade is closed at the first touch. A bar
/// that closes a trade never opens the next one.
pub struct BracketEngine {
    ticker: String,
    params: EngineParams,
    state: StrategyState,
}

impl BracketEngine {
    pub fn new(ticker: impl Into<String>, params: EngineParams) -> Self {
        Self {
            ticker: ticker.into(),
            params,
            state: StrategyState::default(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Feed one bar. `now` is the wall clock used to decide whether a
    /// resulting signal is live.
    pub fn on_bar(&mut self, bar: &Bar, now: DateTime<Utc>) -> Option<Signal> {
        self.state.bars_seen += 1;

        if !self.params.session.contains(bar.received_at) {
            self.state.out_of_session += 1;
            return None;
        }

        if bar.is_closed() {
            self.close_minute(bar);
            return self.try_exit(bar, now);
        }

        self.update_forming(bar);
        if self.state.in_position() {
            return self.try_exit(bar, now);
        }
        self.try_enter(bar, now)
    }

    fn close_minute(&mut self, bar: &Bar) {
        self.state.closed.push(bar.clone());
        if self.state.closed.len() > MAX_CLOSED_BARS {
            self.state.closed.remove(0);
        }
        self.state.forming = None;
        self.state.up_tick_run = 0;
        debug!(
            ticker = %self.ticker,
            close = %bar.close,
            up = bar.is_up(),
            total_profit = %self.state.total_profit,
            trades = self.state.trade_count,
            "Bar closed"
        );
    }

    /// Replace the forming snapshot and extend or reset the up-tick run from
    /// how the tick counters moved since the previous snapshot.
    fn update_forming(&mut self, bar: &Bar) {
        let (up, other) = match &self.state.forming {
            Some(prev)
                if bar.up_ticks >= prev.up_ticks
                    && bar.down_ticks >= prev.down_ticks
                    && bar.unchanged_ticks >= prev.unchanged_ticks =>
            {
                (
                    bar.up_ticks - prev.up_ticks,
                    (bar.down_ticks - prev.down_ticks) + (bar.unchanged_ticks - prev.unchanged_ticks),
                )
            }
            // First snapshot of the minute, or counters restarted.
            _ => (bar.up_ticks, bar.down_ticks + bar.unchanged_ticks),
        };

        self.state.up_tick_run = if other > 0 {
            0
        } else {
            self.state.up_tick_run.saturating_add(up)
        };
        self.state.forming = Some(bar.clone());
    }

    fn try_exit(&mut self, bar: &Bar, now: DateTime<Utc>) -> Option<Signal> {
        let trade = self.state.trade.as_ref()?;
        let Some(profit) = trade.profit(bar) else {
            warn!(
                ticker = %self.ticker,
                entry = %trade.entry_price(),
                close = %bar.close,
                "Price move out of range, holding position"
            );
            return None;
        };
        if !trade.should_exit(bar, &self.params.bracket) {
            return None;
        }
        let Some(total_profit) = self.state.total_profit.checked_add(profit) else {
            warn!(
                ticker = %self.ticker,
                profit = %profit,
                total_profit = %self.state.total_profit,
                "Total profit out of range, holding position"
            );
            return None;
        };

        let side = trade.direction.exit_side();
        self.state.trade = None;
        self.state.total_profit = total_profit;

        info!(
            ticker = %self.ticker,
            side = %side,
            close = %bar.close,
            profit = %profit,
            total_profit = %self.state.total_profit,
            "Trade closed"
        );
        Some(self.signal(side, bar, Some(profit), now))
    }

    fn try_enter(&mut self, bar: &Bar, now: DateTime<Utc>) -> Option<Signal> {
        let needed = self.params.up_bars;
        let closed = &self.state.closed;
        if closed.len() < needed || !closed[closed.len() - needed..].iter().all(Bar::is_up) {
            return None;
        }
        if self.state.up_tick_run < self.params.up_ticks {
            return None;
        }

        let direction = Direction::Long;
        self.state.trade = Some(Trade::new(bar.clone(), direction));
        self.state.trade_count += 1;

        info!(
            ticker = %self.ticker,
            direction = %direction,
            close = %bar.close,
            trades = self.state.trade_count,
            "Trade opened"
        );
        Some(self.signal(direction.entry_side(), bar, None, now))
    }

    fn signal(&self, side: OrderSide, bar: &Bar, profit: Option<Decimal>, now: DateTime<Utc>) -> Signal {
        let live_window = chrono::Duration::from_std(self.params.live_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));
        Signal {
            ticker: self.ticker.clone(),
            side,
            price: bar.close,
            at: bar.received_at,
            profit,
            total_profit: self.state.total_profit,
            trade_count: self.state.trade_count,
            live: bar.received_at >= now - live_window,
        }
    }
}
