//! Download orchestrator: fetches history and profile per symbol and combines them.
//!
//! A failing symbol is reported and skipped; the batch keeps going with
//! whatever the other symbols returned.

use super::provider::{DataError, DataProvider, DownloadProgress, RawBar};
use crate::domain::{CompanyProfile, StockRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Options for a batch download.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Scale OHLC by the adjusted close.
    pub adjust: bool,
}

/// Download every symbol and combine the results into one record set.
pub fn download_stock_data(
    provider: &dyn DataProvider,
    symbols: &[&str],
    opts: DownloadOptions,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut records = Vec::new();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();
    tracing::info!(provider = provider.name(), symbols = total, "downloading");

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let result = download_single(provider, symbol, opts);
        let outcome = result.as_ref().map(|rows| rows.len()).map_err(clone_for_report);
        progress.on_complete(symbol, i, total, &outcome);

        match result {
            Ok(rows) => {
                succeeded += 1;
                records.extend(rows);
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "download failed, continuing");
                errors.push((symbol.to_string(), e));
            }
        }

        // Stop early once the provider has blocked us
        if !provider.is_available() {
            for (j, sym) in symbols.iter().enumerate().skip(i + 1) {
                progress.on_complete(sym, j, total, &Err(DataError::CircuitBreakerTripped));
                errors.push((sym.to_string(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    let failed = errors.len();
    progress.on_batch_complete(records.len(), succeeded, failed, total);

    DownloadSummary {
        requested: total,
        records,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch → adjust → dedupe → enrich a single symbol.
fn download_single(
    provider: &dyn DataProvider,
    symbol: &str,
    opts: DownloadOptions,
) -> Result<Vec<StockRecord>, DataError> {
    let bars = provider.fetch_history(symbol, opts.start, opts.end)?;
    let profile = match provider.fetch_profile(symbol) {
        Ok(p) => p,
        Err(DataError::CircuitBreakerTripped) => return Err(DataError::CircuitBreakerTripped),
        Err(e) => {
            tracing::info!(symbol, error = %e, "no company profile, using defaults");
            CompanyProfile::fallback(symbol)
        }
    };
    Ok(enrich(symbol, bars, &profile, opts.adjust))
}

/// Turn raw bars into records, one per date (last bar wins), sorted by date.
pub fn enrich(
    symbol: &str,
    bars: Vec<RawBar>,
    profile: &CompanyProfile,
    adjust: bool,
) -> Vec<StockRecord> {
    let mut by_date: BTreeMap<NaiveDate, RawBar> = BTreeMap::new();
    for bar in bars {
        let bar = if adjust { bar.adjusted() } else { bar };
        by_date.insert(bar.date, bar);
    }

    by_date
        .into_values()
        .map(|bar| StockRecord {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            symbol: symbol.to_string(),
            company: profile.company.clone(),
            sector: profile.sector.clone(),
            market_cap: profile.market_cap,
        })
        .collect()
}

/// Message-only copy of an error for progress reporters.
fn clone_for_report(e: &DataError) -> DataError {
    match e {
        DataError::CircuitBreakerTripped => DataError::CircuitBreakerTripped,
        DataError::SymbolNotFound { symbol } => DataError::SymbolNotFound {
            symbol: symbol.clone(),
        },
        other => DataError::Other(other.to_string()),
    }
}

/// Summary of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub requested: usize,
    pub records: Vec<StockRecord>,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// The combined records, or `EmptyDataset` when no symbol produced any.
    pub fn into_records(self) -> Result<Vec<StockRecord>, DataError> {
        if self.records.is_empty() {
            return Err(DataError::EmptyDataset {
                requested: self.requested,
            });
        }
        Ok(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> RawBar {
        RawBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
            adj_close: close,
        }
    }

    #[test]
    fn enrich_dedupes_and_sorts() {
        let profile = CompanyProfile {
            company: "Acme".into(),
            sector: "Industrials".into(),
            market_cap: 42,
        };
        let rows = enrich(
            "ACME",
            vec![bar(3, 1.0), bar(2, 2.0), bar(3, 3.0)],
            &profile,
            false,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.to_string(), "2024-01-02");
        assert_eq!(rows[1].close, 3.0);
        assert!(rows.iter().all(|r| r.company == "Acme" && r.market_cap == 42));
    }

    #[test]
    fn empty_summary_is_an_error() {
        let summary = DownloadSummary {
            requested: 3,
            records: vec![],
            succeeded: 0,
            failed: 3,
            errors: vec![],
        };
        assert!(matches!(
            summary.into_records(),
            Err(DataError::EmptyDataset { requested: 3 })
        ));
    }
}
