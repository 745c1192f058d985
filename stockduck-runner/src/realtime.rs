//! Simulated price feed written row by row into DuckDB.

use crate::error::RunnerError;
use crate::table::QueryTable;
use crate::warehouse::Warehouse;
use duckdb::params;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use stockduck_core::config::RealtimeConfig;

pub const REALTIME_TABLE: &str = "realtime_prices";

/// Symbols the feed draws from, with their base prices.
pub const BASE_PRICES: [(&str, f64); 4] = [
    ("AAPL", 150.0),
    ("MSFT", 300.0),
    ("GOOGL", 2500.0),
    ("AMZN", 3000.0),
];

/// Maximum relative deviation from the base price.
pub const MAX_DEVIATION: f64 = 0.02;

const CREATE_TABLE_SQL: &str = "
    CREATE OR REPLACE TABLE realtime_prices (
        symbol VARCHAR,
        price DECIMAL(10,2),
        volume INTEGER,
        timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

const STATS_SQL: &str = "
    SELECT symbol,
           COUNT(*) AS updates,
           AVG(price)::DOUBLE AS avg_price,
           STDDEV(price)::DOUBLE AS price_volatility
    FROM realtime_prices
    GROUP BY symbol
    ORDER BY symbol";

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: &'static str,
    pub price: f64,
    pub volume: i32,
}

#[derive(Debug, Clone)]
pub struct RealtimeOptions {
    pub updates: usize,
    /// Print statistics at update 0 and every `stats_every` updates after.
    pub stats_every: usize,
    pub interval: Duration,
    pub seed: Option<u64>,
}

impl From<&RealtimeConfig> for RealtimeOptions {
    fn from(cfg: &RealtimeConfig) -> Self {
        Self {
            updates: cfg.updates,
            stats_every: cfg.stats_every.max(1),
            interval: Duration::from_millis(cfg.interval_ms),
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeSummary {
    pub inserted: usize,
    pub snapshots: usize,
}

pub fn next_tick(rng: &mut impl Rng) -> Tick {
    let (symbol, base) = BASE_PRICES[rng.gen_range(0..BASE_PRICES.len())];
    let price = base * (1.0 + rng.gen_range(-MAX_DEVIATION..=MAX_DEVIATION));
    Tick {
        symbol,
        price,
        volume: rng.gen_range(1000..=10_000),
    }
}

pub fn create_table(wh: &Warehouse) -> Result<(), RunnerError> {
    wh.execute(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn insert_tick(wh: &Warehouse, tick: &Tick) -> Result<(), RunnerError> {
    wh.connection().execute(
        "INSERT INTO realtime_prices (symbol, price, volume) VALUES (?, ?, ?)",
        params![tick.symbol, tick.price, tick.volume],
    )?;
    Ok(())
}

/// Per-symbol running statistics, ordered by symbol.
pub fn running_stats(wh: &Warehouse) -> Result<QueryTable, RunnerError> {
    Ok(wh.query(STATS_SQL)?)
}

/// Recreate the table and run the insert loop.
///
/// `on_stats` receives the update index and the running statistics whenever
/// the index is a multiple of `stats_every`.
pub fn simulate(
    wh: &Warehouse,
    opts: &RealtimeOptions,
    mut on_stats: impl FnMut(usize, &QueryTable),
) -> Result<RealtimeSummary, RunnerError> {
    create_table(wh)?;
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let every = opts.stats_every.max(1);
    let mut snapshots = 0;

    for update in 0..opts.updates {
        let tick = next_tick(&mut rng);
        insert_tick(wh, &tick)?;
        tracing::trace!(update, symbol = tick.symbol, price = tick.price, "tick inserted");

        if update % every == 0 {
            let stats = running_stats(wh)?;
            on_stats(update, &stats);
            snapshots += 1;
        }

        if !opts.interval.is_zero() {
            std::thread::sleep(opts.interval);
        }
    }

    Ok(RealtimeSummary {
        inserted: opts.updates,
        snapshots,
    })
}

pub fn print_stats(update: usize, stats: &QueryTable) {
    println!("\nUpdate {update}: Running statistics");
    print!("{stats}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let tick = next_tick(&mut rng);
            let base = BASE_PRICES
                .iter()
                .find(|(s, _)| *s == tick.symbol)
                .map(|(_, p)| *p)
                .unwrap();
            assert!((tick.price / base - 1.0).abs() <= MAX_DEVIATION + 1e-12);
            assert!((1000..=10_000).contains(&tick.volume));
        }
    }

    #[test]
    fn same_seed_same_ticks() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(next_tick(&mut a), next_tick(&mut b));
        }
    }

    #[test]
    fn options_from_config() {
        let opts = RealtimeOptions::from(&RealtimeConfig::default());
        assert_eq!(opts.updates, 100);
        assert_eq!(opts.stats_every, 20);
        assert_eq!(opts.interval, Duration::from_millis(100));
    }
}
