//! Installation check: engine versions and a trivial query on each engine.

use crate::error::RunnerError;
use crate::warehouse::Warehouse;
use polars::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DoctorReport {
    pub crate_version: &'static str,
    pub duckdb_version: String,
    pub duckdb_message: String,
    pub polars_version: &'static str,
    pub polars_rows: usize,
}

pub fn run_doctor() -> Result<DoctorReport, RunnerError> {
    let wh = Warehouse::in_memory()?;
    let duckdb_version = wh.version()?;
    let duckdb_message: String =
        wh.connection()
            .query_row("SELECT 'Hello DuckDB!' AS message", [], |row| row.get(0))?;

    let smoke = df![
        "Symbol" => ["AAPL", "MSFT"],
        "Close" => [150.0, 300.0],
    ]?;
    let polars_rows = smoke
        .lazy()
        .filter(col("Close").gt(lit(200.0)))
        .collect()?
        .height();

    Ok(DoctorReport {
        crate_version: env!("CARGO_PKG_VERSION"),
        duckdb_version,
        duckdb_message,
        polars_version: polars::VERSION,
        polars_rows,
    })
}

pub fn print_report(report: &DoctorReport) {
    println!("stockduck version: {}", report.crate_version);
    println!("DuckDB version: {}", report.duckdb_version);
    println!("Polars version: {}", report.polars_version);
    println!("Test result: {}", report.duckdb_message);
    println!("Polars smoke query rows: {}", report.polars_rows);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctor_runs_both_engines() {
        let report = run_doctor().unwrap();
        assert_eq!(report.duckdb_message, "Hello DuckDB!");
        assert!(report.duckdb_version.starts_with('v'));
        assert_eq!(report.polars_rows, 1);
        assert!(report.polars_version.starts_with("0."));
    }
}
