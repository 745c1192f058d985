//! Resident memory of a Polars frame versus a DuckDB in-memory table.
//!
//! RSS deltas are noisy: allocators keep freed pages and DuckDB grabs its
//! buffer pool lazily. Treat the numbers as a rough comparison only.

use crate::error::RunnerError;
use crate::explore::STOCKS_TABLE;
use crate::report::{banner, mb, percent};
use crate::warehouse::Warehouse;
use stockduck_core::data::store;
use std::path::Path;
use sysinfo::{Pid, System};

/// Source of the current process's resident set size, in bytes.
pub trait MemoryProbe {
    fn rss_bytes(&mut self) -> Result<u64, RunnerError>;
}

/// Reads RSS for this process through `sysinfo`.
pub struct ProcessProbe {
    system: System,
    pid: Pid,
}

impl ProcessProbe {
    pub fn new() -> Result<Self, RunnerError> {
        let pid = sysinfo::get_current_pid().map_err(|e| RunnerError::Memory(e.to_string()))?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }
}

impl MemoryProbe for ProcessProbe {
    fn rss_bytes(&mut self) -> Result<u64, RunnerError> {
        self.system.refresh_process(self.pid);
        self.system
            .process(self.pid)
            .map(|p| p.memory())
            .ok_or_else(|| RunnerError::Memory(format!("process {} not visible", self.pid)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryComparison {
    pub baseline_bytes: u64,
    /// RSS growth after loading the Parquet file into a Polars frame.
    pub polars_delta_bytes: f64,
    /// `DataFrame::estimated_size` of that frame.
    pub polars_estimated_bytes: u64,
    /// RSS growth over the same baseline after loading the file into a DuckDB in-memory table.
    pub duckdb_delta_bytes: f64,
    pub rows: usize,
}

impl MemoryComparison {
    /// `(polars - duckdb) / polars * 100`; 0 when the Polars delta is not positive.
    pub fn savings_pct(&self) -> f64 {
        savings_pct(self.polars_delta_bytes, self.duckdb_delta_bytes)
    }
}

pub fn savings_pct(polars: f64, duckdb: f64) -> f64 {
    if polars > 0.0 {
        (polars - duckdb) / polars * 100.0
    } else {
        0.0
    }
}

/// Measure both engines loading the same Parquet file.
///
/// Both deltas are taken against the one baseline read before either load.
/// The Polars frame is dropped before DuckDB loads the file.
pub fn compare_memory_usage(
    parquet: &Path,
    probe: &mut dyn MemoryProbe,
) -> Result<MemoryComparison, RunnerError> {
    let baseline = probe.rss_bytes()?;

    let frame = store::read_parquet_frame(parquet)?;
    let after_polars = probe.rss_bytes()?;
    let polars_estimated_bytes = frame.estimated_size() as u64;
    let rows = frame.height();
    drop(frame);

    let wh = Warehouse::in_memory()?;
    wh.load_parquet(STOCKS_TABLE, parquet)?;
    let after_duckdb = probe.rss_bytes()?;

    let comparison = MemoryComparison {
        baseline_bytes: baseline,
        polars_delta_bytes: after_polars as f64 - baseline as f64,
        polars_estimated_bytes,
        duckdb_delta_bytes: after_duckdb as f64 - baseline as f64,
        rows,
    };
    tracing::info!(?comparison, "memory comparison finished");
    Ok(comparison)
}

pub fn print_comparison(c: &MemoryComparison) {
    println!("{}", banner("Memory usage comparison"));
    println!("Baseline memory: {}", mb(c.baseline_bytes as f64));
    println!("Rows loaded: {}", c.rows);
    println!("Polars DataFrame memory: {}", mb(c.polars_delta_bytes));
    println!("Polars estimated frame size: {}", mb(c.polars_estimated_bytes as f64));
    println!("DuckDB memory usage: {}", mb(c.duckdb_delta_bytes));
    println!("Memory savings with DuckDB: {}", percent(c.savings_pct()));
}
