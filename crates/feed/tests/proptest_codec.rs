use proptest::prelude::*;
use chrono::{TimeZone, Utc};
use feed::{decode, Decoded};
use rust_decimal::Decimal;
use store::BarLogRecord;

fn make_message(prices: [i64; 4], counts: [u64; 8], open: bool) -> String {
    let p = |cents: i64| Decimal::new(cents, 2).to_string();
    format!(
        r#"{{"High":"{}","Low":"{}","Open":"{}","Close":"{}","TimeStamp":"2024-02-14T15:49:00Z","TotalVolume":"{}","DownTicks":{},"DownVolume":{},"OpenInterest":"0","IsRealtime":true,"IsEndOfHistory":false,"TotalTicks":{},"UnchangedTicks":{},"UnchangedVolume":{},"UpTicks":{},"UpVolume":{},"Epoch":1707925740000,"BarStatus":"{}"}}"#,
        p(prices[0]),
        p(prices[1]),
        p(prices[2]),
        p(prices[3]),
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        counts[4],
        counts[5],
        counts[6],
        counts[7],
        if open { "Open" } else { "Closed" },
    )
}

proptest! {
    /// Every price and volume survives decode, log encoding and log decoding.
    #[test]
    fn provider_fields_survive_the_log(
        prices in prop::array::uniform4(0i64..10_000_000),
        counts in prop::array::uniform8(0u64..10_000_000),
        open in any::<bool>(),
    ) {
        let received_at = Utc.with_ymd_and_hms(2024, 2, 14, 15, 48, 22).unwrap();
        let bar = match decode(&make_message(prices, counts, open), received_at).unwrap() {
            Decoded::Bar(bar) => bar,
            other => panic!("Expected a bar, got {other:?}"),
        };

        let record = BarLogRecord::from_bar(&bar);
        prop_assert_eq!(&record.high, &Decimal::new(prices[0], 2).to_string());
        prop_assert_eq!(&record.close, &Decimal::new(prices[3], 2).to_string());
        prop_assert_eq!(&record.total_volume, &counts[0].to_string());
        prop_assert_eq!(record.up_ticks, counts[6]);

        let line = record.to_line().unwrap();
        prop_assert_eq!(BarLogRecord::parse_line(&line).unwrap(), bar);
    }

    /// Arbitrary input is decoded or rejected, never panics.
    #[test]
    fn decode_never_panics(raw in ".{0,300}") {
        let _ = decode(&raw, Utc::now());
    }
}
