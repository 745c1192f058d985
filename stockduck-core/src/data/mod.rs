//! Data acquisition and persistence

pub mod circuit_breaker;
pub mod download;
pub mod provider;
pub mod store;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use download::{download_stock_data, DownloadOptions, DownloadSummary};
pub use provider::{
    DataError, DataProvider, DownloadProgress, NoProgress, RawBar, StdoutProgress,
};
pub use store::{DatasetMeta, StockStore};
pub use synthetic::SyntheticProvider;
pub use universe::Universe;
pub use yahoo::YahooProvider;
