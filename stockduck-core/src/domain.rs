//! Domain types: the flat stock record, company profile, and lookback period.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column names in their fixed on-disk order (CSV header and Parquet schema).
pub const COLUMNS: [&str; 10] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Symbol",
    "Company",
    "Sector",
    "Market_Cap",
];

/// Sector used when the provider has no profile for a symbol.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// One trading day for one symbol, enriched with company metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Market_Cap")]
    pub market_cap: u64,
}

/// Company metadata attached to every record of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company: String,
    pub sector: String,
    pub market_cap: u64,
}

impl CompanyProfile {
    /// Profile used when nothing is known about a symbol: its own ticker as the
    /// name, an unknown sector and a zero market cap.
    pub fn fallback(symbol: &str) -> Self {
        Self {
            company: symbol.to_string(),
            sector: UNKNOWN_SECTOR.to_string(),
            market_cap: 0,
        }
    }
}

/// Lookback window for a history download, in the `2y` / `6mo` / `ytd` style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Months(u32),
    Years(u32),
    YearToDate,
    Max,
}

impl Default for Period {
    fn default() -> Self {
        Period::Years(2)
    }
}

/// Periods accepted by [`Period::parse`].
pub const VALID_PERIODS: &str = "1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max";

impl Period {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "1mo" => Ok(Period::Months(1)),
            "3mo" => Ok(Period::Months(3)),
            "6mo" => Ok(Period::Months(6)),
            "1y" => Ok(Period::Years(1)),
            "2y" => Ok(Period::Years(2)),
            "5y" => Ok(Period::Years(5)),
            "10y" => Ok(Period::Years(10)),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            _ => Err(format!("unknown period '{s}'. Valid: {VALID_PERIODS}")),
        }
    }

    /// First calendar day covered by this period when looking back from `today`.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        match *self {
            Period::Months(m) => today.checked_sub_months(Months::new(m)).unwrap_or(epoch),
            Period::Years(y) => today
                .checked_sub_months(Months::new(y * 12))
                .unwrap_or(epoch),
            Period::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(epoch),
            Period::Max => epoch,
        }
    }

    /// `(start, end)` date range ending at `today`.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (self.start_date(today), today)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Months(m) => write!(f, "{m}mo"),
            Period::Years(y) => write!(f, "{y}y"),
            Period::YearToDate => write!(f, "ytd"),
            Period::Max => write!(f, "max"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::parse(s)
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Period::parse(&value)
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}
