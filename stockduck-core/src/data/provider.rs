//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over market-data sources so the download
//! orchestrator can be driven by Yahoo Finance in production and by a stub in tests.

use crate::domain::CompanyProfile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily OHLCV bar from a data provider (before adjustment/enrichment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl RawBar {
    /// Scale OHLC by `adj_close / close` so the series is split/dividend adjusted.
    ///
    /// Bars without a usable adjusted close are returned unchanged.
    pub fn adjusted(&self) -> RawBar {
        if !self.adj_close.is_finite() || !self.close.is_finite() || self.close == 0.0 {
            return self.clone();
        }
        let ratio = self.adj_close / self.close;
        RawBar {
            date: self.date,
            open: self.open * ratio,
            high: self.high * ratio,
            low: self.low * ratio,
            close: self.adj_close,
            volume: self.volume,
            adj_close: self.adj_close,
        }
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("csv I/O error: {0}")]
    CsvError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no data downloaded for any of {requested} symbol(s)")]
    EmptyDataset { requested: usize },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data providers.
///
/// History and profile are separate calls: a missing profile never fails a
/// symbol, a missing history always does.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a symbol over a date range.
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError>;

    /// Fetch company name, sector and market cap for a symbol.
    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait DownloadProgress {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<usize, DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, records: usize, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints one line per symbol to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(_) => println!("Downloaded data for {symbol}"),
            Err(e) => println!("Error downloading {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, records: usize, _succeeded: usize, _failed: usize, total: usize) {
        println!("Downloaded {records} records for {total} stocks");
    }
}

/// Progress reporter that stays silent.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<usize, DataError>) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: usize) {}
}
