use proptest::prelude::*;
use chrono::{Duration, TimeZone, Utc};
use common::{Bar, BarStatus, OrderSide};
use rust_decimal::Decimal;
use strategy::{BracketEngine, EngineParams, SessionWindow};

fn make_bar(step: i64, closed: bool, open: Decimal, close: Decimal, ticks: (u64, u64, u64)) -> Bar {
    Bar {
        received_at: Utc.with_ymd_and_hms(2024, 2, 14, 18, 0, 0).unwrap() + Duration::seconds(step * 5),
        bar_time: None,
        status: if closed { BarStatus::Closed } else { BarStatus::Open },
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        total_volume: ticks.0 + ticks.1 + ticks.2,
        up_volume: ticks.0,
        down_volume: ticks.1,
        total_ticks: ticks.0 + ticks.1 + ticks.2,
        up_ticks: ticks.0,
        down_ticks: ticks.1,
        unchanged_ticks: ticks.2,
        unchanged_volume: ticks.2,
    }
}

/// Mostly prices around 100.00, with the occasional value at the edge of
/// what a `Decimal` can hold.
fn price() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        8 => (9_000i64..11_000).prop_map(|cents| Decimal::new(cents, 2)),
        1 => Just(Decimal::MAX),
        1 => Just(Decimal::MIN),
        1 => any::<i64>().prop_map(|m| Decimal::new(m, 0)),
    ]
}

fn bars_strategy() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (any::<bool>(), price(), price(), (0u64..20, 0u64..5, 0u64..5)),
        0..200,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (closed, open, close, ticks))| make_bar(i as i64, closed, open, close, ticks))
            .collect()
    })
}

proptest! {
    /// Arbitrary bar sequences never panic, signals alternate BUY/SELL, and
    /// the running profit equals the sum of realized exits.
    #[test]
    fn engine_keeps_its_books_straight(bars in bars_strategy()) {
        let params = EngineParams { session: SessionWindow::all_day(), ..EngineParams::default() };
        let mut engine = BracketEngine::new("ESH24", params);
        let now = Utc.with_ymd_and_hms(2024, 2, 14, 20, 0, 0).unwrap();

        let mut expected_side = OrderSide::Buy;
        let mut realized = Decimal::ZERO;
        let mut entries = 0u32;

        for bar in &bars {
            if let Some(signal) = engine.on_bar(bar, now) {
                prop_assert_eq!(signal.side, expected_side);
                match signal.side {
                    OrderSide::Buy => {
                        entries += 1;
                        prop_assert!(signal.profit.is_none());
                        expected_side = OrderSide::Sell;
                    }
                    OrderSide::Sell => {
                        let profit = signal.profit.unwrap();
                        prop_assert!(profit >= Decimal::from(2) || profit <= Decimal::from(-4));
                        realized += profit;
                        expected_side = OrderSide::Buy;
                    }
                }
                prop_assert_eq!(signal.total_profit, realized);
                prop_assert_eq!(signal.trade_count, entries);
            }
        }

        prop_assert_eq!(engine.state().total_profit(), realized);
        prop_assert_eq!(engine.state().in_position(), expected_side == OrderSide::Sell);
        prop_assert_eq!(engine.state().bars_seen(), bars.len() as u64);
    }
}
