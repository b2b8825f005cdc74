//! Per-symbol price history with a date index and precomputed features.

use crate::domain::features::{FeatureFrame, build_features};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct AssetData {
    pub symbol: String,
    pub ohlcv: Vec<OhlcvBar>,
    pub features: FeatureFrame,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl AssetData {
    pub fn new(symbol: String, ohlcv: Vec<OhlcvBar>) -> Self {
        let date_index = ohlcv
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        let features = build_features(&ohlcv);
        Self {
            symbol,
            ohlcv,
            features,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.ohlcv.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.ohlcv.iter().map(|b| b.date).collect()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.ohlcv[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.get_bar(date).map(|b| b.close)
    }
}
