//! Symbol universe: parsing symbol lists and loading their histories.
//!
//! Symbols that cannot be loaded or have too little history are skipped
//! with a warning; the run fails only when nothing usable remains.

use crate::domain::error::MarketLensError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Split a comma-separated symbol list, uppercasing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadSkip {
    NoData,
    InsufficientBars { bars: usize },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: LoadSkip,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    /// Loaded histories in the order the symbols were requested.
    pub histories: Vec<(String, Vec<OhlcvBar>)>,
    pub skipped: Vec<SkippedSymbol>,
}

impl LoadedUniverse {
    pub fn count(&self) -> usize {
        self.histories.len()
    }
}

pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    min_bars: usize,
) -> Result<LoadedUniverse, MarketLensError> {
    let mut histories = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let reason = match data_port.fetch_ohlcv(symbol, start_date, end_date) {
            Ok(bars) if bars.is_empty() => LoadSkip::NoData,
            Ok(bars) if bars.len() < min_bars => LoadSkip::InsufficientBars { bars: bars.len() },
            Ok(bars) => {
                info!(symbol = %symbol, bars = bars.len(), "loaded");
                histories.push((symbol.clone(), bars));
                continue;
            }
            Err(MarketLensError::NoData { .. }) => LoadSkip::NoData,
            Err(e) => LoadSkip::Failed(e.to_string()),
        };
        warn!(symbol = %symbol, reason = ?reason, minimum = min_bars, "skipping symbol");
        skipped.push(SkippedSymbol {
            symbol: symbol.clone(),
            reason,
        });
    }

    if histories.is_empty() {
        let symbol = symbols.first().cloned().unwrap_or_else(|| "all".to_string());
        return Err(match skipped.first().map(|s| &s.reason) {
            Some(LoadSkip::InsufficientBars { bars }) if symbols.len() == 1 => {
                MarketLensError::InsufficientData {
                    symbol,
                    bars: *bars,
                    minimum: min_bars,
                }
            }
            _ => MarketLensError::NoData {
                symbol: if symbols.len() == 1 { symbol } else { "all".to_string() },
            },
        });
    }

    if !skipped.is_empty() {
        info!(
            loaded = histories.len(),
            requested = symbols.len(),
            "partial universe"
        );
    }

    Ok(LoadedUniverse { histories, skipped })
}
