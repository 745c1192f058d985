//! DuckDB warehouse: a thin owner of one `duckdb::Connection`.
//!
//! All SQL the workflows issue goes through here so that path quoting,
//! identifier validation and result materialization live in one place.

use crate::table::{Cell, QueryTable};
use duckdb::types::Value;
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("duckdb: {0}")]
    Duckdb(#[from] duckdb::Error),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("source file not found: {0} (run `stockduck download` first)")]
    MissingSource(PathBuf),

    #[error("query returned no rows: {0}")]
    NoRows(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on a DuckDB database (file-backed or in-memory).
pub struct Warehouse {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Warehouse {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WarehouseError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened duckdb database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self, WarehouseError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run one or more statements that return nothing.
    pub fn execute(&self, sql: &str) -> Result<(), WarehouseError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// (Re)create `table` from a Parquet file. Returns the load time.
    pub fn load_parquet(&self, table: &str, parquet: &Path) -> Result<Duration, WarehouseError> {
        let table = ident(table)?;
        if !parquet.exists() {
            return Err(WarehouseError::MissingSource(parquet.to_path_buf()));
        }
        let start = Instant::now();
        self.execute(&format!(
            "CREATE OR REPLACE TABLE {table} AS SELECT * FROM read_parquet({})",
            sql_path(parquet)
        ))?;
        let elapsed = start.elapsed();
        tracing::info!(table, db = ?self.path(), ?elapsed, "loaded parquet into table");
        Ok(elapsed)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, WarehouseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Create `table` from Parquet only if it does not exist yet.
    pub fn ensure_table(&self, table: &str, parquet: &Path) -> Result<(), WarehouseError> {
        if !self.table_exists(table)? {
            self.load_parquet(table, parquet)?;
        }
        Ok(())
    }

    /// Run a query and materialize every row.
    pub fn query(&self, sql: &str) -> Result<QueryTable, WarehouseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let columns = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(Cell::from(row.get::<_, Value>(i)?));
            }
            out.push(cells);
        }

        Ok(QueryTable { columns, rows: out })
    }

    /// First column of the first row as an integer.
    pub fn query_scalar_i64(&self, sql: &str) -> Result<i64, WarehouseError> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    /// First row of a query.
    pub fn query_one(&self, sql: &str) -> Result<Vec<Cell>, WarehouseError> {
        self.query(sql)?
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| WarehouseError::NoRows(sql.to_string()))
    }

    /// `(column, type)` pairs from `DESCRIBE`.
    pub fn describe(&self, table: &str) -> Result<Vec<(String, String)>, WarehouseError> {
        let table = ident(table)?;
        let result = self.query(&format!("DESCRIBE {table}"))?;
        Ok(result
            .rows
            .iter()
            .map(|r| {
                let text = |i: usize| r.get(i).map(|c| c.to_string()).unwrap_or_default();
                (text(0), text(1))
            })
            .collect())
    }

    pub fn copy_to_csv(&self, table: &str, path: &Path) -> Result<(), WarehouseError> {
        let table = ident(table)?;
        self.execute(&format!(
            "COPY {table} TO {} (HEADER, DELIMITER ',')",
            sql_path(path)
        ))
    }

    pub fn copy_to_parquet(&self, table: &str, path: &Path) -> Result<(), WarehouseError> {
        let table = ident(table)?;
        self.execute(&format!("COPY {table} TO {} (FORMAT PARQUET)", sql_path(path)))
    }

    pub fn version(&self) -> Result<String, WarehouseError> {
        Ok(self
            .conn
            .query_row("SELECT version()", [], |row| row.get::<_, String>(0))?)
    }
}

/// Accept only plain identifiers so table names can be spliced into SQL.
pub fn ident(name: &str) -> Result<&str, WarehouseError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(WarehouseError::InvalidIdentifier(name.to_string()))
    }
}

/// Single-quoted SQL string literal for a filesystem path.
pub fn sql_path(path: &Path) -> String {
    sql_str(&path.to_string_lossy())
}

/// Single-quoted SQL string literal.
pub fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
