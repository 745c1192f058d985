//! Offline provider producing deterministic fake price history.
//!
//! Every symbol gets its own random walk seeded from the symbol name, so
//! repeated runs produce identical datasets. Useful for demos without
//! network access and for tests.

use super::provider::{DataError, DataProvider, RawBar};
use super::universe::Universe;
use crate::domain::{CompanyProfile, UNKNOWN_SECTOR};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SyntheticProvider {
    universe: Universe,
}

impl SyntheticProvider {
    /// Sectors are taken from `universe`; unknown symbols get `"Unknown"`.
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }

    fn sector_of(&self, symbol: &str) -> &str {
        self.universe
            .sectors
            .iter()
            .find(|g| g.tickers.iter().any(|t| t.eq_ignore_ascii_case(symbol)))
            .map_or(UNKNOWN_SECTOR, |g| g.name.as_str())
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(Universe::default_sp500_sample())
    }
}

fn rng_for(symbol: &str, salt: &str) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(salt.as_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Weekday bars between `start` and `end` inclusive.
pub fn synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawBar> {
    let mut rng = rng_for(symbol, "history");
    let mut price: f64 = rng.gen_range(20.0..500.0);
    let mut bars = Vec::new();

    for date in start.iter_days().take_while(|d| *d <= end) {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));

        bars.push(RawBar {
            date,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(500_000..50_000_000u64),
            adj_close: close,
        });
        price = close;
    }

    bars
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        if start > end {
            return Err(DataError::ValidationError(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(synthetic_bars(symbol, start, end))
    }

    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, DataError> {
        // log-uniform between 5e9 and 3e12
        let exponent: f64 = rng_for(symbol, "profile").gen_range(9.7..12.48);
        Ok(CompanyProfile {
            company: format!("{symbol} Holdings"),
            sector: self.sector_of(symbol).to_string(),
            market_cap: 10f64.powf(exponent) as u64,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let a = synthetic_bars("AAPL", d(2024, 1, 1), d(2024, 3, 31));
        let b = synthetic_bars("AAPL", d(2024, 1, 1), d(2024, 3, 31));
        let c = synthetic_bars("MSFT", d(2024, 1, 1), d(2024, 3, 31));
        assert_eq!(a, b);
        assert_ne!(a[0].close, c[0].close);
    }

    #[test]
    fn skips_weekends_and_keeps_ohlc_consistent() {
        // 2024-01-06 is a Saturday
        let bars = synthetic_bars("KO", d(2024, 1, 1), d(2024, 1, 14));
        assert_eq!(bars.len(), 10);
        assert!(bars.iter().all(|b| b.date.weekday() != Weekday::Sat));
        for b in &bars {
            assert!(b.low <= b.open.min(b.close));
            assert!(b.high >= b.open.max(b.close));
        }
    }

    #[test]
    fn profile_uses_universe_sector() {
        let p = SyntheticProvider::default();
        assert_eq!(p.fetch_profile("JPM").unwrap().sector, "Financial Services");
        assert_eq!(p.fetch_profile("ZZZZ").unwrap().sector, UNKNOWN_SECTOR);
        let cap = p.fetch_profile("AAPL").unwrap().market_cap;
        assert!((5_000_000_000..=3_100_000_000_000).contains(&cap));
    }

    #[test]
    fn rejects_inverted_range() {
        let p = SyntheticProvider::default();
        assert!(p.fetch_history("AAPL", d(2024, 2, 1), d(2024, 1, 1)).is_err());
    }
}
