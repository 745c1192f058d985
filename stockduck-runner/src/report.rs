//! Text formatting and CSV export for workflow results.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// `1234567` → `"1,234,567"`.
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Seconds with four decimals, e.g. `0.0123s`.
pub fn secs(d: Duration) -> String {
    format!("{:.4}s", d.as_secs_f64())
}

pub fn mb(bytes: f64) -> String {
    format!("{:.2} MB", bytes / (1024.0 * 1024.0))
}

pub fn percent(v: f64) -> String {
    format!("{v:.1}%")
}

/// Section banner used by every workflow.
pub fn banner(title: &str) -> String {
    let rule = "=".repeat(title.chars().count().max(40));
    format!("{rule}\n{title}\n{rule}")
}

/// One line of `performance_results.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRow {
    pub query: String,
    pub duckdb_time: f64,
    pub polars_time: f64,
    pub speedup: f64,
}

/// Write rows with a header line. Returns the number of rows written.
pub fn write_benchmark_csv(path: &Path, rows: &[BenchmarkRow]) -> Result<usize, csv::Error> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        wtr.write_record(["query", "duckdb_time", "polars_time", "speedup"])?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(11_022), "11,022");
        assert_eq!(thousands(-1_234_567), "-1,234,567");
    }

    #[test]
    fn durations_and_sizes() {
        assert_eq!(secs(Duration::from_millis(12)), "0.0120s");
        assert_eq!(mb(3.0 * 1024.0 * 1024.0), "3.00 MB");
        assert_eq!(percent(42.26), "42.3%");
    }

    #[test]
    fn benchmark_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("performance_results.csv");
        let rows = vec![
            BenchmarkRow {
                query: "Daily Volume Analysis".into(),
                duckdb_time: 0.01,
                polars_time: 0.02,
                speedup: 2.0,
            },
            BenchmarkRow {
                query: "Price Performance".into(),
                duckdb_time: 0.0,
                polars_time: 0.03,
                speedup: 0.0,
            },
        ];
        assert_eq!(write_benchmark_csv(&path, &rows).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "query,duckdb_time,polars_time,speedup");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Daily Volume Analysis,0.01,0.02,2.0");
    }
}
