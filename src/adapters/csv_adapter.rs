//! CSV file data adapter.
//!
//! One file per symbol, `<SYMBOL>.csv`, with header
//! `date,open,high,low,close,volume`. A `/` in a symbol maps to `-` in the
//! file name.

use crate::domain::error::MarketLensError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn data_err(reason: String) -> MarketLensError {
    MarketLensError::Data { reason }
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, MarketLensError> {
    record
        .get(index)
        .ok_or_else(|| data_err(format!("missing {name} column")))?
        .trim()
        .parse()
        .map_err(|e| data_err(format!("invalid {name} value: {e}")))
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.replace('/', "-")))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<OhlcvBar>, MarketLensError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(MarketLensError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_err(format!("CSV parse error: {e}")))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| data_err("missing date column".into()))?;
            // timestamps such as "2024-01-02 00:00:00" keep only the date part
            let date_part = date_str.trim().split([' ', 'T']).next().unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map_err(|e| data_err(format!("invalid date format: {e}")))?;

            bars.push(OhlcvBar {
                symbol: symbol.to_string(),
                date,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
                volume: parse_field(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, MarketLensError> {
        let mut bars = self.read_all(symbol)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, MarketLensError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_err(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_err(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketLensError> {
        let bars = match self.read_all(symbol) {
            Ok(bars) => bars,
            Err(MarketLensError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
