//! First look at the dataset inside DuckDB.

use crate::error::RunnerError;
use crate::report::{banner, secs, thousands};
use crate::table::QueryTable;
use crate::warehouse::Warehouse;
use chrono::NaiveDate;
use std::path::Path;
use std::time::Duration;

pub const STOCKS_TABLE: &str = "stocks";

/// Summary of the loaded `stocks` table.
#[derive(Debug, Clone)]
pub struct TableOverview {
    pub load_time: Duration,
    pub total_records: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_symbols: i64,
    pub schema: Vec<(String, String)>,
    pub sample: QueryTable,
}

/// Load `parquet` into the `stocks` table and collect the overview.
pub fn inspect(wh: &Warehouse, parquet: &Path) -> Result<TableOverview, RunnerError> {
    let load_time = wh.load_parquet(STOCKS_TABLE, parquet)?;

    let total_records = wh.query_scalar_i64("SELECT COUNT(*) FROM stocks")?;
    let range = wh.query_one("SELECT MIN(Date), MAX(Date) FROM stocks")?;
    let unique_symbols = wh.query_scalar_i64("SELECT COUNT(DISTINCT Symbol) FROM stocks")?;
    let schema = wh.describe(STOCKS_TABLE)?;
    let sample = wh.query("SELECT * FROM stocks LIMIT 5")?;

    Ok(TableOverview {
        load_time,
        total_records,
        first_date: range.first().and_then(|c| c.as_date()),
        last_date: range.get(1).and_then(|c| c.as_date()),
        unique_symbols,
        schema,
        sample,
    })
}

pub fn print_overview(overview: &TableOverview) {
    let date = |d: Option<NaiveDate>| d.map_or_else(|| "n/a".to_string(), |d| d.to_string());

    println!("{}", banner("Dataset overview"));
    println!("Data loaded in {}", secs(overview.load_time));
    println!("Total records: {}", thousands(overview.total_records));
    println!(
        "Date range: {} to {}",
        date(overview.first_date),
        date(overview.last_date)
    );
    println!("Unique stocks: {}", overview.unique_symbols);

    println!("\nTable schema:");
    for (name, kind) in &overview.schema {
        println!("  {name:<12} {kind}");
    }

    println!("\nSample data:");
    print!("{}", overview.sample);
}
