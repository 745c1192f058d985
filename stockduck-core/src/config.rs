//! TOML application configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock layout: `stocks.csv`, `stocks.parquet`, `financial_analysis.duckdb`
//! and `realtime.duckdb` in the working directory.

use crate::data::Universe;
use crate::domain::Period;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stockduck.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub database: DatabaseConfig,
    pub output: OutputConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    pub parquet_path: PathBuf,
    pub period: Period,
    pub adjust_prices: bool,
    /// Explicit ticker list; takes precedence over `universe_file`.
    pub symbols: Option<Vec<String>>,
    pub universe_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: "stocks.csv".into(),
            parquet_path: "stocks.parquet".into(),
            period: Period::default(),
            adjust_prices: true,
            symbols: None,
            universe_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub realtime_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "financial_analysis.duckdb".into(),
            realtime_path: "realtime.duckdb".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: ".".into() }
    }
}

impl OutputConfig {
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub updates: usize,
    pub stats_every: usize,
    pub interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            updates: 100,
            stats_every: 20,
            interval_ms: 100,
            seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `stockduck.toml` if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realtime.stats_every == 0 {
            return Err(ConfigError::Invalid("realtime.stats_every must be > 0".into()));
        }
        if let Some(symbols) = &self.data.symbols {
            if symbols.iter().all(|s| s.trim().is_empty()) {
                return Err(ConfigError::Invalid("data.symbols is empty".into()));
            }
        }
        Ok(())
    }

    /// The ticker universe for downloads: explicit symbols, then the universe
    /// file, then the built-in 22-stock sample.
    pub fn universe(&self) -> Result<Universe, ConfigError> {
        if let Some(symbols) = &self.data.symbols {
            return Ok(Universe::from_tickers(symbols));
        }
        match &self.data.universe_file {
            Some(path) => Universe::from_file(path).map_err(ConfigError::Invalid),
            None => Ok(Universe::default_sp500_sample()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.data.parquet_path, PathBuf::from("stocks.parquet"));
        assert_eq!(config.database.path, PathBuf::from("financial_analysis.duckdb"));
        assert_eq!(config.realtime.updates, 100);
        assert!(config.data.adjust_prices);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [data]
            period = "6mo"
            symbols = ["spy", "qqq"]

            [realtime]
            interval_ms = 0
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.data.period, Period::Months(6));
        assert_eq!(config.data.csv_path, PathBuf::from("stocks.csv"));
        assert_eq!(config.realtime.stats_every, 20);
        assert_eq!(config.realtime.seed, Some(7));
        assert_eq!(config.universe().unwrap().all_tickers(), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn rejects_bad_period_and_zero_stats_interval() {
        assert!(matches!(
            AppConfig::from_toml("[data]\nperiod = \"2w\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[realtime]\nstats_every = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn default_universe_is_the_sample() {
        let config = AppConfig::default();
        assert_eq!(config.universe().unwrap().ticker_count(), 22);
    }

    #[test]
    fn output_files_join_the_dir() {
        let out = OutputConfig { dir: "results".into() };
        assert_eq!(
            out.file("performance_results.csv"),
            PathBuf::from("results/performance_results.csv")
        );
    }
}
