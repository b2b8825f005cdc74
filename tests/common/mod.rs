#![allow(dead_code)]

use chrono::NaiveDate;
use marketlens::domain::error::MarketLensError;
pub use marketlens::domain::ohlcv::OhlcvBar;
use marketlens::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, MarketLensError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(MarketLensError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) => Ok(bars
                .iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect()),
            None => Err(MarketLensError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, MarketLensError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MarketLensError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000.0,
    }
}

/// Bars on consecutive days from a close series.
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, start + chrono::Duration::days(i as i64), c))
        .collect()
}

/// Deterministic oscillating random-walk-like prices with a drift per bar.
pub fn generate_bars(symbol: &str, start: NaiveDate, count: usize, start_price: f64, drift: f64) -> Vec<OhlcvBar> {
    let phase = symbol.bytes().map(f64::from).sum::<f64>();
    let mut close = start_price;
    (0..count)
        .map(|i| {
            let t = i as f64;
            let step = drift + 0.012 * (t * 0.7 + phase).sin() + 0.006 * (t * 0.23).cos();
            let open = close;
            close *= 1.0 + step;
            OhlcvBar {
                symbol: symbol.to_string(),
                date: start + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) * 1.004,
                low: open.min(close) * 0.996,
                close,
                volume: 10_000.0 + 1_500.0 * ((i % 7) as f64),
            }
        })
        .collect()
}

pub fn write_csv(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let path = dir.join(format!("{}.csv", symbol.replace('/', "-")));
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "date,open,high,low,close,volume").unwrap();
    for b in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.date, b.open, b.high, b.low, b.close, b.volume
        )
        .unwrap();
    }
}
