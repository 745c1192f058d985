//! Property tests for periods and the CSV store.

use chrono::NaiveDate;
use proptest::prelude::*;
use stockduck_core::data::store::{read_csv, write_csv};
use stockduck_core::{Period, StockRecord};

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_period() -> impl Strategy<Value = Period> {
    prop_oneof![
        prop::sample::select(vec![1u32, 3, 6]).prop_map(Period::Months),
        prop::sample::select(vec![1u32, 2, 5, 10]).prop_map(Period::Years),
        Just(Period::YearToDate),
        Just(Period::Max),
    ]
}

fn arb_record() -> impl Strategy<Value = StockRecord> {
    (
        arb_date(),
        1.0f64..5000.0,
        0u64..10_000_000_000,
        "[A-Z]{1,5}",
        "[A-Za-z ,.&]{1,30}",
        0u64..4_000_000_000_000,
    )
        .prop_map(|(date, price, volume, symbol, company, cap)| StockRecord {
            date,
            open: price,
            high: price * 1.01,
            low: price * 0.99,
            close: price,
            volume,
            symbol,
            company,
            sector: "Technology".into(),
            market_cap: cap,
        })
}

proptest! {
    /// A lookback never starts after the day it looks back from.
    #[test]
    fn period_start_not_after_today(today in arb_date(), period in arb_period()) {
        let (start, end) = period.range(today);
        prop_assert!(start <= end);
        prop_assert_eq!(end, today);
    }

    /// Display and parse agree for every period.
    #[test]
    fn period_display_parses_back(period in arb_period()) {
        prop_assert_eq!(Period::parse(&period.to_string()).unwrap(), period);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The CSV holds exactly one data row per in-memory record.
    #[test]
    fn csv_row_count_equals_record_count(records in prop::collection::vec(arb_record(), 0..40)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocks.csv");
        let written = write_csv(&path, &records).unwrap();
        let read = read_csv(&path).unwrap();
        prop_assert_eq!(written, records.len());
        prop_assert_eq!(read.len(), records.len());
    }
}
