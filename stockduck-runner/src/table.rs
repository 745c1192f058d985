//! Materialized query results.
//!
//! DuckDB rows are converted into a small [`Cell`] enum so reports can be
//! printed, inspected in tests and exported without holding a statement open.

use chrono::{NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value};
use std::fmt;

/// A single value from a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::Int(v) => Some(v as f64),
            Cell::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Cell::Int(v) => Some(v),
            Cell::Float(v) if v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match *self {
            Cell::Date(d) => Some(d),
            Cell::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Boolean(b) => Cell::Bool(b),
            Value::TinyInt(v) => Cell::Int(v.into()),
            Value::SmallInt(v) => Cell::Int(v.into()),
            Value::Int(v) => Cell::Int(v.into()),
            Value::BigInt(v) => Cell::Int(v),
            Value::UTinyInt(v) => Cell::Int(v.into()),
            Value::USmallInt(v) => Cell::Int(v.into()),
            Value::UInt(v) => Cell::Int(v.into()),
            Value::UBigInt(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
            Value::HugeInt(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
            Value::Float(v) => Cell::Float(v.into()),
            Value::Double(v) => Cell::Float(v),
            Value::Decimal(d) => d
                .to_string()
                .parse::<f64>()
                .map_or_else(|_| Cell::Text(d.to_string()), Cell::Float),
            Value::Text(s) => Cell::Text(s),
            Value::Enum(s) => Cell::Text(s),
            Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
                .map_or(Cell::Null, Cell::Date),
            Value::Timestamp(unit, v) => {
                let micros = match unit {
                    TimeUnit::Second => v.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => v.saturating_mul(1_000),
                    TimeUnit::Microsecond => v,
                    TimeUnit::Nanosecond => v / 1_000,
                };
                chrono::DateTime::from_timestamp_micros(micros)
                    .map_or(Cell::Null, |dt| Cell::Timestamp(dt.naive_utc()))
            }
            other => Cell::Text(format!("{other:?}")),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) if v.abs() >= 1e6 => write!(f, "{v:.0}"),
            Cell::Float(v) => write!(f, "{v:.4}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Date(d) => write!(f, "{d}"),
            Cell::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryTable {
    /// `(rows, columns)`, like a dataframe shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn head(&self, n: usize) -> QueryTable {
        QueryTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }

    pub fn f64_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(Cell::as_f64).collect())
    }

    pub fn text_column(&self, name: &str) -> Option<Vec<String>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(|c| c.to_string()).collect())
    }

    /// Fixed-width text rendering with a header rule.
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return String::from("(no columns)\n");
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|s| s.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |values: Vec<&str>| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{v:>w$}", w = *w))
                .collect::<Vec<_>>()
                .join("  ")
        };

        let mut out = String::new();
        out.push_str(&line(self.columns.iter().map(String::as_str).collect()));
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
        out.push('\n');
        for row in &cells {
            out.push_str(&line(row.iter().map(String::as_str).collect()));
            out.push('\n');
        }
        if self.rows.is_empty() {
            out.push_str("(0 rows)\n");
        }
        out
    }
}

impl fmt::Display for QueryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> QueryTable {
        QueryTable {
            columns: vec!["Symbol".into(), "avg".into()],
            rows: vec![
                vec![Cell::Text("AAPL".into()), Cell::Float(1.5)],
                vec![Cell::Text("MSFT".into()), Cell::Null],
                vec![Cell::Text("KO".into()), Cell::Int(3)],
            ],
        }
    }

    #[test]
    fn shape_and_head() {
        let t = table();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.head(2).shape(), (2, 2));
        assert_eq!(t.head(10).len(), 3);
    }

    #[test]
    fn column_access_is_case_insensitive() {
        let t = table();
        assert_eq!(t.column_index("symbol"), Some(0));
        assert_eq!(
            t.f64_column("AVG").unwrap(),
            vec![Some(1.5), None, Some(3.0)]
        );
        assert!(t.column("missing").is_none());
    }

    #[test]
    fn render_aligns_columns() {
        let text = table().render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].len(), lines[2].len());
        assert!(lines[3].contains("NULL"));
    }

    #[test]
    fn converts_duckdb_values() {
        assert_eq!(
            Cell::from(Value::Date32(19_724)),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(Cell::from(Value::UBigInt(7)), Cell::Int(7));
        assert_eq!(Cell::from(Value::Text("x".into())).as_str(), Some("x"));
        let ts = Cell::from(Value::Timestamp(TimeUnit::Second, 1_704_153_600));
        assert_eq!(ts.as_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
    }
}
