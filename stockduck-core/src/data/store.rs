//! CSV and Parquet persistence for the flat stock dataset.
//!
//! Both formats carry the same ten columns in the same order
//! (see [`crate::domain::COLUMNS`]). Parquet writes are atomic (write to
//! `.tmp`, rename into place) and every saved dataset gets a JSON metadata
//! sidecar next to the Parquet file.

use super::provider::DataError;
use crate::domain::{StockRecord, COLUMNS};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar describing a saved dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub rows: usize,
    /// Symbols in first-seen order.
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_hash: String,
    pub created_at: chrono::NaiveDateTime,
}

impl DatasetMeta {
    pub fn from_records(records: &[StockRecord]) -> Result<Self, DataError> {
        let start_date = records
            .iter()
            .map(|r| r.date)
            .min()
            .ok_or(DataError::EmptyDataset { requested: 0 })?;
        let end_date = records.iter().map(|r| r.date).max().unwrap_or(start_date);

        let mut symbols: Vec<String> = Vec::new();
        for r in records {
            if !symbols.iter().any(|s| s == &r.symbol) {
                symbols.push(r.symbol.clone());
            }
        }

        let bytes = serde_json::to_vec(records)
            .map_err(|e| DataError::Other(format!("hash serialization: {e}")))?;

        Ok(Self {
            rows: records.len(),
            symbols,
            start_date,
            end_date,
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            created_at: chrono::Local::now().naive_local(),
        })
    }
}

/// The dataset's CSV and Parquet locations.
#[derive(Debug, Clone)]
pub struct StockStore {
    csv_path: PathBuf,
    parquet_path: PathBuf,
}

impl StockStore {
    pub fn new(csv_path: impl Into<PathBuf>, parquet_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            parquet_path: parquet_path.into(),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn parquet_path(&self) -> &Path {
        &self.parquet_path
    }

    /// `stocks.parquet` → `stocks.meta.json`
    pub fn meta_path(&self) -> PathBuf {
        self.parquet_path.with_extension("meta.json")
    }

    /// Write records to both formats plus the metadata sidecar.
    pub fn save(&self, records: &[StockRecord]) -> Result<DatasetMeta, DataError> {
        let meta = DatasetMeta::from_records(records)?;
        write_csv(&self.csv_path, records)?;
        write_parquet(&self.parquet_path, records)?;

        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Other(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(), json)
            .map_err(|e| DataError::Other(format!("meta write: {e}")))?;

        tracing::info!(
            rows = meta.rows,
            csv = %self.csv_path.display(),
            parquet = %self.parquet_path.display(),
            "dataset saved"
        );
        Ok(meta)
    }

    pub fn load_records(&self) -> Result<Vec<StockRecord>, DataError> {
        read_parquet(&self.parquet_path)
    }

    pub fn load_frame(&self) -> Result<DataFrame, DataError> {
        read_parquet_frame(&self.parquet_path)
    }

    pub fn meta(&self) -> Option<DatasetMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

// ── CSV ─────────────────────────────────────────────────────────────

/// Write records as CSV with a header row. Returns the number of data rows written.
pub fn write_csv(path: &Path, records: &[StockRecord]) -> Result<usize, DataError> {
    ensure_parent(path)?;
    let mut wtr =
        csv::Writer::from_path(path).map_err(|e| DataError::CsvError(format!("create: {e}")))?;
    // serialize() only emits the header with the first row
    if records.is_empty() {
        wtr.write_record(COLUMNS)
            .map_err(|e| DataError::CsvError(format!("write header: {e}")))?;
    }
    for r in records {
        wtr.serialize(r)
            .map_err(|e| DataError::CsvError(format!("write row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| DataError::CsvError(format!("flush: {e}")))?;
    Ok(records.len())
}

pub fn read_csv(path: &Path) -> Result<Vec<StockRecord>, DataError> {
    let mut rdr =
        csv::Reader::from_path(path).map_err(|e| DataError::CsvError(format!("open: {e}")))?;

    let headers = rdr
        .headers()
        .map_err(|e| DataError::CsvError(format!("header: {e}")))?;
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(DataError::ValidationError(format!(
            "unexpected CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    rdr.deserialize()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| DataError::CsvError(format!("row {}: {e}", i + 1))))
        .collect()
}

// ── Parquet ─────────────────────────────────────────────────────────

/// Build a DataFrame with the fixed column layout.
pub fn records_to_frame(records: &[StockRecord]) -> Result<DataFrame, DataError> {
    let epoch = epoch();
    let dates: Vec<i32> = records
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = records.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = records.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = records.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let volumes: Vec<i64> = records.iter().map(|r| to_i64(r.volume)).collect();
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let companies: Vec<&str> = records.iter().map(|r| r.company.as_str()).collect();
    let sectors: Vec<&str> = records.iter().map(|r| r.sector.as_str()).collect();
    let caps: Vec<i64> = records.iter().map(|r| to_i64(r.market_cap)).collect();

    DataFrame::new(vec![
        Column::new("Date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("Open".into(), opens),
        Column::new("High".into(), highs),
        Column::new("Low".into(), lows),
        Column::new("Close".into(), closes),
        Column::new("Volume".into(), volumes),
        Column::new("Symbol".into(), symbols),
        Column::new("Company".into(), companies),
        Column::new("Sector".into(), sectors),
        Column::new("Market_Cap".into(), caps),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Convert a DataFrame with the fixed columns back to records.
///
/// Numeric columns are cast to their canonical types first, so frames produced
/// by other writers (unsigned volumes, Float32 prices) are accepted.
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<StockRecord>, DataError> {
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{name}'")));
        }
    }

    let get = |name: &str, dtype: DataType| -> Result<Column, DataError> {
        df.column(name)
            .and_then(|c| c.cast(&dtype))
            .map_err(|e| DataError::ParquetError(format!("column '{name}': {e}")))
    };
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("column '{name}' type: {e}"))
    };

    let date_col = get("Date", DataType::Date)?;
    let open_col = get("Open", DataType::Float64)?;
    let high_col = get("High", DataType::Float64)?;
    let low_col = get("Low", DataType::Float64)?;
    let close_col = get("Close", DataType::Float64)?;
    let volume_col = get("Volume", DataType::Int64)?;
    let symbol_col = get("Symbol", DataType::String)?;
    let company_col = get("Company", DataType::String)?;
    let sector_col = get("Sector", DataType::String)?;
    let cap_col = get("Market_Cap", DataType::Int64)?;

    let date_ca = date_col.date().map_err(|e| type_err("Date", e))?;
    let open_ca = open_col.f64().map_err(|e| type_err("Open", e))?;
    let high_ca = high_col.f64().map_err(|e| type_err("High", e))?;
    let low_ca = low_col.f64().map_err(|e| type_err("Low", e))?;
    let close_ca = close_col.f64().map_err(|e| type_err("Close", e))?;
    let volume_ca = volume_col.i64().map_err(|e| type_err("Volume", e))?;
    let symbol_ca = symbol_col.str().map_err(|e| type_err("Symbol", e))?;
    let company_ca = company_col.str().map_err(|e| type_err("Company", e))?;
    let sector_ca = sector_col.str().map_err(|e| type_err("Sector", e))?;
    let cap_ca = cap_col.i64().map_err(|e| type_err("Market_Cap", e))?;

    let epoch = epoch();
    let mut records = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ValidationError(format!("null Date at row {i}")))?;
        let symbol = symbol_ca
            .get(i)
            .ok_or_else(|| DataError::ValidationError(format!("null Symbol at row {i}")))?;

        records.push(StockRecord {
            date: epoch + chrono::Duration::days(days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: volume_ca.get(i).unwrap_or(0).max(0) as u64,
            symbol: symbol.to_string(),
            company: company_ca.get(i).unwrap_or(symbol).to_string(),
            sector: sector_ca
                .get(i)
                .unwrap_or(crate::domain::UNKNOWN_SECTOR)
                .to_string(),
            market_cap: cap_ca.get(i).unwrap_or(0).max(0) as u64,
        });
    }

    Ok(records)
}

/// Write records to Parquet atomically.
pub fn write_parquet(path: &Path, records: &[StockRecord]) -> Result<(), DataError> {
    let mut df = records_to_frame(records)?;
    write_frame(path, &mut df)
}

/// Write any frame to Parquet atomically.
pub fn write_frame(path: &Path, df: &mut DataFrame) -> Result<(), DataError> {
    ensure_parent(path)?;
    let tmp_path = path.with_extension("parquet.tmp");

    let file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::ParquetError(format!("atomic rename failed: {e}"))
    })
}

pub fn read_parquet_frame(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path)
        .map_err(|e| DataError::ParquetError(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))
}

pub fn read_parquet(path: &Path) -> Result<Vec<StockRecord>, DataError> {
    frame_to_records(&read_parquet_frame(path)?)
}

fn ensure_parent(path: &Path) -> Result<(), DataError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|e| DataError::Other(format!("create dir {}: {e}", dir.display()))),
        _ => Ok(()),
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<StockRecord> {
        vec![
            StockRecord {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 187.15,
                high: 188.44,
                low: 183.89,
                close: 185.64,
                volume: 82_488_700,
                symbol: "AAPL".into(),
                company: "Apple Inc.".into(),
                sector: "Technology".into(),
                market_cap: 2_900_000_000_000,
            },
            StockRecord {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 58.1,
                high: 58.9,
                low: 57.6,
                close: 58.7,
                volume: 13_000_000,
                symbol: "KO".into(),
                company: "The Coca-Cola Company, Inc.".into(),
                sector: "Consumer Defensive".into(),
                market_cap: 260_000_000_000,
            },
        ]
    }

    #[test]
    fn frame_has_fixed_column_order() {
        let df = records_to_frame(&sample()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        assert_eq!(df.column("Date").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn csv_row_count_matches_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocks.csv");
        let written = write_csv(&path, &sample()).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(lines.count(), 2);

        // commas inside company names must survive quoting
        assert_eq!(read_csv(&path).unwrap(), sample());
    }

    #[test]
    fn parquet_round_trip_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = StockStore::new(
            dir.path().join("stocks.csv"),
            dir.path().join("stocks.parquet"),
        );
        let meta = store.save(&sample()).unwrap();

        assert_eq!(meta.rows, 2);
        assert_eq!(meta.symbols, vec!["AAPL".to_string(), "KO".to_string()]);
        assert_eq!(store.meta().unwrap().data_hash, meta.data_hash);
        assert_eq!(store.load_records().unwrap(), sample());
        assert!(!dir.path().join("stocks.parquet.tmp").exists());
    }

    #[test]
    fn missing_column_is_rejected() {
        let df = records_to_frame(&sample()).unwrap().drop("Sector").unwrap();
        let err = frame_to_records(&df).unwrap_err();
        assert!(matches!(err, DataError::ValidationError(_)));
    }

    #[test]
    fn meta_of_empty_dataset_fails() {
        assert!(DatasetMeta::from_records(&[]).is_err());
    }
}
