//! Four ways of combining Polars frames, Parquet files and DuckDB SQL.

use crate::error::RunnerError;
use crate::explore::STOCKS_TABLE;
use crate::report::banner;
use crate::table::QueryTable;
use crate::warehouse::{sql_path, Warehouse};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use stockduck_core::data::store;

pub const HIGH_VOLUME_TABLE: &str = "high_volume_analysis";
pub const ANALYSIS_CSV: &str = "analysis_results.csv";
pub const ANALYSIS_PARQUET: &str = "analysis_results.parquet";

/// Days at or below this volume are ignored by the file-direct pattern.
pub const HIGH_VOLUME_THRESHOLD: i64 = 1_000_000;
/// Symbols need more than this many high-volume days to be reported.
pub const MIN_TRADING_DAYS: i64 = 100;

/// Symbols included in the moving-average example.
pub const TECHNICAL_SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "GOOGL"];

#[derive(Debug, Clone)]
pub struct PatternsReport {
    pub top_returns: QueryTable,
    pub high_volume: QueryTable,
    pub technical: QueryTable,
    pub exported: Vec<PathBuf>,
    pub volatility: QueryTable,
}

/// Add `Price_Change` and `Price_Change_Pct` (close vs open).
pub fn with_price_change(df: DataFrame) -> PolarsResult<DataFrame> {
    df.lazy()
        .with_columns([
            (col("Close") - col("Open")).alias("Price_Change"),
            ((col("Close") - col("Open")) / col("Open") * lit(100.0)).alias("Price_Change_Pct"),
        ])
        .collect()
}

fn staging_path(name: &str) -> PathBuf {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "stockduck_{}_{n}_{name}.parquet",
        std::process::id()
    ))
}

/// Pattern 1: enrich in Polars, aggregate in DuckDB.
///
/// The frame is staged as Parquet in the temp dir and exposed to DuckDB as a
/// temporary table; the staging file is removed afterwards.
pub fn dataframe_enrichment(wh: &Warehouse, parquet: &Path) -> Result<QueryTable, RunnerError> {
    let mut enriched = with_price_change(store::read_parquet_frame(parquet)?)?;

    let staged = staging_path("enriched");
    store::write_frame(&staged, &mut enriched)?;
    let loaded = wh.execute(&format!(
        "CREATE OR REPLACE TEMP TABLE enriched AS SELECT * FROM read_parquet({})",
        sql_path(&staged)
    ));
    if let Err(e) = std::fs::remove_file(&staged) {
        tracing::warn!(path = %staged.display(), error = %e, "could not remove staging file");
    }
    loaded?;

    Ok(wh.query(
        "SELECT Symbol,
                AVG(Price_Change_Pct) AS avg_daily_return,
                STDDEV(Price_Change_Pct) AS volatility
         FROM enriched
         GROUP BY Symbol
         ORDER BY avg_daily_return DESC
         LIMIT 10",
    )?)
}

/// Pattern 2: aggregate straight from the Parquet file into `high_volume_analysis`.
pub fn file_direct_processing(wh: &Warehouse, parquet: &Path) -> Result<QueryTable, RunnerError> {
    wh.execute(&format!(
        "CREATE OR REPLACE TABLE {HIGH_VOLUME_TABLE} AS
         SELECT Symbol,
                COUNT(*) AS trading_days,
                AVG(Volume * Close) AS avg_dollar_volume,
                CORR(Volume, Close) AS volume_price_correlation
         FROM read_parquet({})
         WHERE Volume > {HIGH_VOLUME_THRESHOLD}
         GROUP BY Symbol
         HAVING COUNT(*) > {MIN_TRADING_DAYS}
         ORDER BY avg_dollar_volume DESC",
        sql_path(parquet)
    ))?;
    Ok(wh.query(&format!(
        "SELECT * FROM {HIGH_VOLUME_TABLE} ORDER BY avg_dollar_volume DESC"
    ))?)
}

/// Pattern 3: 20/50-day moving averages and price rank, newest rows first.
pub fn window_functions(wh: &Warehouse) -> Result<QueryTable, RunnerError> {
    let symbols = TECHNICAL_SYMBOLS
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(wh.query(&format!(
        "SELECT Symbol,
                Date,
                Close,
                AVG(Close) OVER (
                    PARTITION BY Symbol ORDER BY Date
                    ROWS BETWEEN 19 PRECEDING AND CURRENT ROW
                ) AS sma_20,
                AVG(Close) OVER (
                    PARTITION BY Symbol ORDER BY Date
                    ROWS BETWEEN 49 PRECEDING AND CURRENT ROW
                ) AS sma_50,
                ROW_NUMBER() OVER (PARTITION BY Symbol ORDER BY Close DESC) AS price_rank
         FROM {STOCKS_TABLE}
         WHERE Symbol IN ({symbols})
         ORDER BY Symbol, Date DESC"
    ))?)
}

/// Pattern 4a: export `high_volume_analysis` to CSV and Parquet in `output_dir`.
pub fn export_results(wh: &Warehouse, output_dir: &Path) -> Result<Vec<PathBuf>, RunnerError> {
    std::fs::create_dir_all(output_dir)?;
    let csv_path = output_dir.join(ANALYSIS_CSV);
    let parquet_path = output_dir.join(ANALYSIS_PARQUET);
    wh.copy_to_csv(HIGH_VOLUME_TABLE, &csv_path)?;
    wh.copy_to_parquet(HIGH_VOLUME_TABLE, &parquet_path)?;
    tracing::info!(
        csv = %csv_path.display(),
        parquet = %parquet_path.display(),
        "analysis exported"
    );
    Ok(vec![csv_path, parquet_path])
}

/// Pattern 4b: `daily_returns` view, first day of each symbol excluded.
pub fn create_daily_returns_view(wh: &Warehouse) -> Result<(), RunnerError> {
    wh.execute(&format!(
        "CREATE OR REPLACE VIEW daily_returns AS
         SELECT Symbol,
                Date,
                Close,
                prev_close,
                (Close - prev_close) / prev_close * 100 AS daily_return
         FROM (
             SELECT Symbol,
                    Date,
                    Close,
                    LAG(Close) OVER (PARTITION BY Symbol ORDER BY Date) AS prev_close
             FROM {STOCKS_TABLE}
         )
         WHERE prev_close IS NOT NULL"
    ))?;
    Ok(())
}

pub fn volatility_analysis(wh: &Warehouse) -> Result<QueryTable, RunnerError> {
    Ok(wh.query(
        "SELECT Symbol,
                AVG(daily_return) AS mean_return,
                STDDEV(daily_return) AS volatility,
                MIN(daily_return) AS worst_day,
                MAX(daily_return) AS best_day
         FROM daily_returns
         GROUP BY Symbol
         ORDER BY volatility DESC",
    )?)
}

/// Run all four patterns in order.
pub fn run_patterns(
    wh: &Warehouse,
    parquet: &Path,
    output_dir: &Path,
) -> Result<PatternsReport, RunnerError> {
    wh.ensure_table(STOCKS_TABLE, parquet)?;

    let top_returns = dataframe_enrichment(wh, parquet)?;
    let high_volume = file_direct_processing(wh, parquet)?;
    let technical = window_functions(wh)?;
    let exported = export_results(wh, output_dir)?;
    create_daily_returns_view(wh)?;
    let volatility = volatility_analysis(wh)?;

    Ok(PatternsReport {
        top_returns,
        high_volume,
        technical,
        exported,
        volatility,
    })
}

pub fn print_report(report: &PatternsReport) {
    println!("{}", banner("DuckDB integration patterns"));

    println!("\n1. Direct DataFrame Operations");
    println!("Top performing stocks by average daily return:");
    print!("{}", report.top_returns);

    println!("\n2. Memory-efficient File Processing");
    println!("High-volume trading analysis:");
    print!("{}", report.high_volume.head(5));

    println!("\n3. Complex Analytical Functions");
    println!("Technical analysis (sample):");
    print!("{}", report.technical.head(10));

    println!("\n4. Data Export Patterns");
    for path in &report.exported {
        println!("Exported {}", path.display());
    }
    println!("Volatility analysis:");
    print!("{}", report.volatility.head(5));

    println!("\nAnalysis complete! Check generated files.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_change_columns() {
        let df = df![
            "Open" => [100.0, 50.0],
            "Close" => [110.0, 45.0],
        ]
        .unwrap();
        let out = with_price_change(df).unwrap();
        let change: Vec<Option<f64>> = out
            .column("Price_Change")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        let pct: Vec<Option<f64>> = out
            .column("Price_Change_Pct")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(change, vec![Some(10.0), Some(-5.0)]);
        assert_eq!(pct, vec![Some(10.0), Some(-10.0)]);
    }

    #[test]
    fn daily_returns_skip_first_row_per_symbol() {
        let wh = Warehouse::in_memory().unwrap();
        wh.execute(
            "CREATE TABLE stocks AS SELECT * FROM (VALUES
                ('A', DATE '2024-01-02', 100.0),
                ('A', DATE '2024-01-03', 110.0),
                ('B', DATE '2024-01-02', 50.0),
                ('B', DATE '2024-01-03', 25.0),
                ('B', DATE '2024-01-04', 50.0)
             ) t(Symbol, Date, Close)",
        )
        .unwrap();
        create_daily_returns_view(&wh).unwrap();

        assert_eq!(wh.query_scalar_i64("SELECT COUNT(*) FROM daily_returns").unwrap(), 3);
        let first_a = wh
            .query_one("SELECT daily_return FROM daily_returns WHERE Symbol = 'A'")
            .unwrap();
        assert!((first_a[0].as_f64().unwrap() - 10.0).abs() < 1e-9);

        let vol = volatility_analysis(&wh).unwrap();
        assert_eq!(vol.text_column("Symbol").unwrap(), vec!["B", "A"]);
    }
}
