//! StockDuck CLI: download a stock dataset and analyze it with DuckDB.
//!
//! Commands:
//! - `download`: fetch daily history from Yahoo Finance into CSV and Parquet
//! - `inspect`: load the Parquet file into DuckDB and summarize it
//! - `memory`: compare resident memory of a Polars frame and a DuckDB table
//! - `benchmark`: time the query suite on DuckDB and Polars
//! - `patterns`: run the four integration patterns and export results
//! - `realtime`: simulate a live price feed inserted into DuckDB
//! - `doctor`: print engine versions and run smoke queries

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stockduck_core::data::{
    download_stock_data, CircuitBreaker, DataProvider, DownloadOptions, StdoutProgress,
    StockStore, SyntheticProvider, Universe, YahooProvider,
};
use stockduck_core::{AppConfig, Period};
use stockduck_runner::realtime::{self, RealtimeOptions};
use stockduck_runner::report::{self as fmt_report, write_benchmark_csv};
use stockduck_runner::{benchmark, doctor, explore, memory, patterns, ProcessProbe, Warehouse};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stockduck",
    version,
    about = "StockDuck: stock data download and DuckDB analytics"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./stockduck.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily history and company info, save as CSV and Parquet.
    Download {
        /// Symbols to download. Defaults to the configured universe.
        symbols: Vec<String>,

        /// Lookback period: 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max.
        #[arg(long, value_parser = Period::parse)]
        period: Option<Period>,

        /// Keep raw prices instead of split/dividend adjusted ones.
        #[arg(long, default_value_t = false)]
        no_adjust: bool,

        /// Generate deterministic offline data instead of calling Yahoo.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Load the Parquet file into DuckDB and print an overview.
    Inspect,
    /// Compare memory used by a Polars frame and a DuckDB table.
    Memory,
    /// Time the query suite on DuckDB and Polars.
    Benchmark,
    /// Run the integration patterns and export analysis results.
    Patterns,
    /// Simulate realtime price updates inserted into DuckDB.
    Realtime {
        /// Number of updates to insert.
        #[arg(long)]
        updates: Option<usize>,

        /// Delay between updates in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// RNG seed for a reproducible feed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print versions and run smoke queries on both engines.
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Download {
            symbols,
            period,
            no_adjust,
            synthetic,
        } => run_download(&config, symbols, period, no_adjust, synthetic),
        Commands::Inspect => run_inspect(&config),
        Commands::Memory => run_memory(&config),
        Commands::Benchmark => run_benchmark_cmd(&config),
        Commands::Patterns => run_patterns_cmd(&config),
        Commands::Realtime {
            updates,
            interval_ms,
            seed,
        } => run_realtime(&config, updates, interval_ms, seed),
        Commands::Doctor => run_doctor_cmd(),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn store_for(config: &AppConfig) -> StockStore {
    StockStore::new(&config.data.csv_path, &config.data.parquet_path)
}

fn run_download(
    config: &AppConfig,
    symbols: Vec<String>,
    period: Option<Period>,
    no_adjust: bool,
    synthetic: bool,
) -> Result<()> {
    let configured = config.universe()?;
    let universe = if symbols.is_empty() {
        configured.clone()
    } else {
        Universe::from_tickers(&symbols)
    };
    let tickers = universe.all_tickers();

    let period = period.unwrap_or(config.data.period);
    let (start, end) = period.range(chrono::Local::now().date_naive());
    let opts = DownloadOptions {
        start,
        end,
        adjust: config.data.adjust_prices && !no_adjust,
    };
    tracing::info!(symbols = tickers.len(), %period, %start, %end, "starting download");

    let provider: Box<dyn DataProvider> = if synthetic {
        // explicit tickers carry no sector, so look them up in the configured universe
        Box::new(SyntheticProvider::new(configured))
    } else {
        Box::new(YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?)
    };

    let summary = download_stock_data(provider.as_ref(), &tickers, opts, &StdoutProgress);
    let records = summary.into_records()?;

    let store = store_for(config);
    let meta = store.save(&records)?;
    println!(
        "Data saved to {} and {}",
        store.csv_path().display(),
        store.parquet_path().display()
    );
    println!(
        "{} rows, {} symbols, {} to {}",
        fmt_report::thousands(meta.rows as i64),
        meta.symbols.len(),
        meta.start_date,
        meta.end_date
    );
    Ok(())
}

fn run_inspect(config: &AppConfig) -> Result<()> {
    let wh = Warehouse::open(&config.database.path)?;
    let overview = explore::inspect(&wh, &config.data.parquet_path)?;
    explore::print_overview(&overview);
    Ok(())
}

fn run_memory(config: &AppConfig) -> Result<()> {
    let mut probe = ProcessProbe::new()?;
    let comparison = memory::compare_memory_usage(&config.data.parquet_path, &mut probe)?;
    memory::print_comparison(&comparison);
    Ok(())
}

fn run_benchmark_cmd(config: &AppConfig) -> Result<()> {
    let wh = Warehouse::open(&config.database.path)?;
    wh.ensure_table(explore::STOCKS_TABLE, &config.data.parquet_path)?;

    let report = benchmark::run_benchmark(
        &wh,
        &config.data.parquet_path,
        &benchmark::query_suite(),
    )?;
    benchmark::print_report(&report);

    let rows = report.rows();
    if !rows.is_empty() {
        let path = config.output.file("performance_results.csv");
        write_benchmark_csv(&path, &rows)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Results saved to {}", path.display());
    }
    Ok(())
}

fn run_patterns_cmd(config: &AppConfig) -> Result<()> {
    let wh = Warehouse::open(&config.database.path)?;
    let report = patterns::run_patterns(&wh, &config.data.parquet_path, &config.output.dir)?;
    patterns::print_report(&report);
    Ok(())
}

fn run_realtime(
    config: &AppConfig,
    updates: Option<usize>,
    interval_ms: Option<u64>,
    seed: Option<u64>,
) -> Result<()> {
    let mut opts = RealtimeOptions::from(&config.realtime);
    if let Some(n) = updates {
        opts.updates = n;
    }
    if let Some(ms) = interval_ms {
        opts.interval = std::time::Duration::from_millis(ms);
    }
    if seed.is_some() {
        opts.seed = seed;
    }

    let wh = Warehouse::open(&config.database.realtime_path)?;
    let summary = realtime::simulate(&wh, &opts, realtime::print_stats)?;
    println!(
        "\nInserted {} updates into {}",
        summary.inserted,
        realtime::REALTIME_TABLE
    );
    Ok(())
}

fn run_doctor_cmd() -> Result<()> {
    let report = doctor::run_doctor()?;
    doctor::print_report(&report);
    Ok(())
}
