use crate::warehouse::WarehouseError;
use polars::prelude::PolarsError;
use stockduck_core::data::DataError;
use thiserror::Error;

/// Errors from the analysis workflows.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("memory probe unavailable: {0}")]
    Memory(String),
}

impl From<duckdb::Error> for RunnerError {
    fn from(e: duckdb::Error) -> Self {
        RunnerError::Warehouse(WarehouseError::Duckdb(e))
    }
}
