//! Universe configuration: sector-grouped ticker lists.
//!
//! Stored as TOML with an array of sector tables. Declaration order is kept,
//! so downloads and reports follow the order the file lists tickers in.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named group of tickers (e.g., Healthcare).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorGroup {
    pub name: String,
    pub tickers: Vec<String>,
}

/// The complete universe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: Vec<SectorGroup>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize universe: {e}"))
    }

    /// Build a single-group universe from an explicit ticker list.
    pub fn from_tickers<S: AsRef<str>>(tickers: &[S]) -> Self {
        Self {
            sectors: vec![SectorGroup {
                name: "Custom".into(),
                tickers: tickers
                    .iter()
                    .map(|t| t.as_ref().trim().to_ascii_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            }],
        }
    }

    /// All tickers in declaration order, duplicates removed.
    pub fn all_tickers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in self.sectors.iter().flat_map(|s| s.tickers.iter()) {
            if !out.contains(&t.as_str()) {
                out.push(t.as_str());
            }
        }
        out
    }

    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors
            .iter()
            .find(|s| s.name == sector)
            .map(|s| s.tickers.as_slice())
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.all_tickers().len()
    }

    /// The 22-stock S&P 500 sample the download workflow uses by default.
    pub fn default_sp500_sample() -> Self {
        let group = |name: &str, tickers: &[&str]| SectorGroup {
            name: name.to_string(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
        };

        Self {
            sectors: vec![
                group("Technology", &["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]),
                group("Financial Services", &["JPM", "BAC", "WFC", "GS"]),
                group("Healthcare", &["JNJ", "PFE", "UNH", "ABBV"]),
                group("Energy", &["XOM", "CVX"]),
                group("Consumer Goods", &["WMT", "PG", "KO", "PEP"]),
                group("Payments", &["V", "MA", "PYPL"]),
            ],
        }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::default_sp500_sample()
    }
}
