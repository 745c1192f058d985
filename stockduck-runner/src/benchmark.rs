//! Query latency comparison: DuckDB SQL versus the same query in Polars.
//!
//! Each suite entry carries the SQL run against the persistent `stocks`
//! table and, where one exists, a Polars lazy plan computing the same result
//! from a frame loaded once up front.

use crate::error::RunnerError;
use crate::report::{banner, secs, BenchmarkRow};
use crate::warehouse::Warehouse;
use polars::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use stockduck_core::data::store;

pub type PolarsQuery = fn(&DataFrame) -> PolarsResult<DataFrame>;

/// One named query of the suite.
#[derive(Clone)]
pub struct BenchmarkQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
    pub polars: Option<PolarsQuery>,
}

const DAILY_VOLUME_SQL: &str = "
    SELECT Sector,
           COUNT(*) AS trading_days,
           AVG(Volume) AS avg_volume,
           SUM(Volume) AS total_volume
    FROM stocks
    WHERE Volume > 0
    GROUP BY Sector
    ORDER BY avg_volume DESC";

const PRICE_PERFORMANCE_SQL: &str = "
    SELECT Symbol,
           DATE_TRUNC('month', Date) AS month,
           AVG(Close) AS avg_price,
           (MAX(High) - MIN(Low)) / MIN(Low) * 100 AS monthly_volatility
    FROM stocks
    GROUP BY Symbol, DATE_TRUNC('month', Date)
    ORDER BY monthly_volatility DESC
    LIMIT 10";

const MARKET_CAP_SQL: &str = "
    SELECT CASE
               WHEN Market_Cap > 200000000000 THEN 'Large Cap'
               WHEN Market_Cap > 10000000000 THEN 'Mid Cap'
               ELSE 'Small Cap'
           END AS cap_category,
           COUNT(DISTINCT Symbol) AS companies,
           AVG(Close) AS avg_stock_price,
           SUM(Volume) AS total_volume
    FROM stocks
    WHERE Market_Cap > 0
    GROUP BY cap_category
    ORDER BY companies DESC";

fn descending() -> SortMultipleOptions {
    SortMultipleOptions::default().with_order_descending(true)
}

pub fn daily_volume_polars(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .filter(col("Volume").gt(lit(0)))
        .group_by([col("Sector")])
        .agg([
            col("Volume").count().alias("trading_days"),
            col("Volume").mean().alias("avg_volume"),
            col("Volume").sum().alias("total_volume"),
        ])
        .sort(["avg_volume"], descending())
        .collect()
}

pub fn price_performance_polars(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([
            col("Symbol"),
            col("Date").dt().truncate(lit("1mo")).alias("month"),
        ])
        .agg([
            col("Close").mean().alias("avg_price"),
            ((col("High").max() - col("Low").min()) / col("Low").min() * lit(100.0))
                .alias("monthly_volatility"),
        ])
        .sort(["monthly_volatility"], descending())
        .limit(10)
        .collect()
}

/// Cap bucket using the same strict thresholds as the SQL `CASE`.
pub fn cap_category(market_cap: i64) -> &'static str {
    if market_cap > 200_000_000_000 {
        "Large Cap"
    } else if market_cap > 10_000_000_000 {
        "Mid Cap"
    } else {
        "Small Cap"
    }
}

/// The three comparison queries, in report order.
pub fn query_suite() -> Vec<BenchmarkQuery> {
    vec![
        BenchmarkQuery {
            name: "Daily Volume Analysis",
            description: "Calculate average daily volume by sector",
            sql: DAILY_VOLUME_SQL,
            polars: Some(daily_volume_polars),
        },
        BenchmarkQuery {
            name: "Price Performance",
            description: "Calculate monthly price performance",
            sql: PRICE_PERFORMANCE_SQL,
            polars: Some(price_performance_polars),
        },
        BenchmarkQuery {
            name: "Market Cap Analysis",
            description: "Analyze market cap distribution",
            sql: MARKET_CAP_SQL,
            polars: None,
        },
    ]
}

/// Polars time over DuckDB time; 0 when the DuckDB time is zero.
pub fn speedup(polars: Duration, duckdb: Duration) -> f64 {
    let duck = duckdb.as_secs_f64();
    if duck > 0.0 {
        polars.as_secs_f64() / duck
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct QueryTiming {
    pub name: String,
    pub description: String,
    pub duckdb_time: Duration,
    /// `(rows, columns)` of the DuckDB result.
    pub shape: (usize, usize),
    pub polars_time: Option<Duration>,
    pub polars_shape: Option<(usize, usize)>,
}

impl QueryTiming {
    pub fn speedup(&self) -> Option<f64> {
        self.polars_time.map(|p| speedup(p, self.duckdb_time))
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub polars_load_time: Duration,
    pub timings: Vec<QueryTiming>,
}

impl BenchmarkReport {
    /// Mean speedup over the queries that have a Polars equivalent.
    pub fn average_speedup(&self) -> Option<f64> {
        let speedups: Vec<f64> = self.timings.iter().filter_map(QueryTiming::speedup).collect();
        if speedups.is_empty() {
            None
        } else {
            Some(speedups.iter().sum::<f64>() / speedups.len() as f64)
        }
    }

    /// CSV rows for the measured queries.
    pub fn rows(&self) -> Vec<BenchmarkRow> {
        self.timings
            .iter()
            .filter_map(|t| {
                let polars = t.polars_time?;
                Some(BenchmarkRow {
                    query: t.name.clone(),
                    duckdb_time: t.duckdb_time.as_secs_f64(),
                    polars_time: polars.as_secs_f64(),
                    speedup: speedup(polars, t.duckdb_time),
                })
            })
            .collect()
    }
}

/// Time every suite query on both engines.
///
/// `wh` must already hold the `stocks` table; `parquet` is read once by
/// Polars and the load time reported separately.
pub fn run_benchmark(
    wh: &Warehouse,
    parquet: &Path,
    queries: &[BenchmarkQuery],
) -> Result<BenchmarkReport, RunnerError> {
    let start = Instant::now();
    let frame = store::read_parquet_frame(parquet)?;
    let polars_load_time = start.elapsed();
    tracing::info!(rows = frame.height(), ?polars_load_time, "polars frame loaded");

    let mut timings = Vec::with_capacity(queries.len());
    for query in queries {
        let start = Instant::now();
        let result = wh.query(query.sql)?;
        let duckdb_time = start.elapsed();

        let (polars_time, polars_shape) = match query.polars {
            Some(run) => {
                let start = Instant::now();
                let out = run(&frame)?;
                (Some(start.elapsed()), Some(out.shape()))
            }
            None => (None, None),
        };

        tracing::debug!(query = query.name, ?duckdb_time, ?polars_time, "query timed");
        timings.push(QueryTiming {
            name: query.name.to_string(),
            description: query.description.to_string(),
            duckdb_time,
            shape: result.shape(),
            polars_time,
            polars_shape,
        });
    }

    Ok(BenchmarkReport {
        polars_load_time,
        timings,
    })
}

pub fn print_report(report: &BenchmarkReport) {
    println!("{}", banner("Query performance comparison"));
    println!("Polars Parquet load: {}", secs(report.polars_load_time));

    for t in &report.timings {
        println!("\n=== {} ===", t.name);
        println!("Description: {}", t.description);
        println!("DuckDB time: {}", secs(t.duckdb_time));
        println!("Result shape: ({}, {})", t.shape.0, t.shape.1);
        if let (Some(p), Some(s)) = (t.polars_time, t.speedup()) {
            println!("Polars time: {}", secs(p));
            println!("DuckDB speedup: {s:.2}x");
        }
    }

    if let Some(avg) = report.average_speedup() {
        println!("\n=== Performance Summary ===");
        println!("Average DuckDB speedup: {avg:.2}x");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speedup_zero_when_duckdb_time_zero() {
        assert_eq!(speedup(Duration::from_millis(5), Duration::ZERO), 0.0);
        assert_eq!(
            speedup(Duration::from_millis(40), Duration::from_millis(10)),
            4.0
        );
    }

    #[test]
    fn cap_thresholds_are_strict() {
        assert_eq!(cap_category(200_000_000_000), "Mid Cap");
        assert_eq!(cap_category(200_000_000_001), "Large Cap");
        assert_eq!(cap_category(10_000_000_000), "Small Cap");
        assert_eq!(cap_category(10_000_000_001), "Mid Cap");
    }

    #[test]
    fn suite_order_and_market_cap_is_sql_only() {
        let suite = query_suite();
        let names: Vec<&str> = suite.iter().map(|q| q.name).collect();
        assert_eq!(
            names,
            vec!["Daily Volume Analysis", "Price Performance", "Market Cap Analysis"]
        );
        assert!(suite[2].polars.is_none());
    }

    #[test]
    fn average_ignores_unmeasured_queries() {
        let timing = |polars: Option<u64>| QueryTiming {
            name: "q".into(),
            description: String::new(),
            duckdb_time: Duration::from_millis(10),
            shape: (1, 1),
            polars_time: polars.map(Duration::from_millis),
            polars_shape: None,
        };
        let report = BenchmarkReport {
            polars_load_time: Duration::ZERO,
            timings: vec![timing(Some(20)), timing(Some(40)), timing(None)],
        };
        assert_eq!(report.average_speedup(), Some(3.0));
        assert_eq!(report.rows().len(), 2);

        let empty = BenchmarkReport {
            polars_load_time: Duration::ZERO,
            timings: vec![timing(None)],
        };
        assert_eq!(empty.average_speedup(), None);
    }
}
