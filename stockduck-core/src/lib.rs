//! StockDuck Core: data model, Yahoo Finance provider, download orchestration, CSV/Parquet store.
//!
//! This crate owns everything up to the point where the dataset lands on disk:
//! - Domain types (stock records, company profiles, lookback periods)
//! - Data provider trait with a Yahoo Finance implementation and circuit breaker
//! - Multi-symbol download with per-symbol failure isolation
//! - CSV and Parquet persistence with a fixed column layout
//! - Sector-organized ticker universes and TOML configuration

pub mod config;
pub mod data;
pub mod domain;

pub use config::{AppConfig, ConfigError};
pub use domain::{CompanyProfile, Period, StockRecord};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across the runner boundary are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<StockRecord>();
        require_sync::<StockRecord>();
        require_send::<CompanyProfile>();
        require_sync::<CompanyProfile>();
        require_send::<AppConfig>();
        require_sync::<AppConfig>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
    }
}
