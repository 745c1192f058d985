//! StockDuck Runner: analysis workflows over the downloaded dataset.
//!
//! This crate builds on `stockduck-core` to provide:
//! - A DuckDB warehouse wrapper with materialized query results
//! - Dataset inspection (row counts, date range, schema, sample rows)
//! - Memory footprint comparison between Polars and DuckDB
//! - A query latency suite run on both engines
//! - Integration patterns (frame enrichment, file-direct SQL, window functions, export)
//! - A simulated realtime insert loop
//! - An installation check

pub mod benchmark;
pub mod doctor;
pub mod error;
pub mod explore;
pub mod memory;
pub mod patterns;
pub mod realtime;
pub mod report;
pub mod table;
pub mod warehouse;

pub use benchmark::{query_suite, run_benchmark, BenchmarkQuery, BenchmarkReport, QueryTiming};
pub use doctor::{run_doctor, DoctorReport};
pub use error::RunnerError;
pub use explore::{inspect, TableOverview, STOCKS_TABLE};
pub use memory::{compare_memory_usage, MemoryComparison, MemoryProbe, ProcessProbe};
pub use patterns::{run_patterns, PatternsReport};
pub use realtime::{simulate, RealtimeOptions, RealtimeSummary, Tick};
pub use table::{Cell, QueryTable};
pub use warehouse::{Warehouse, WarehouseError};
