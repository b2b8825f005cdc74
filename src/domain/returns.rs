//! Return series derived from prices.
//!
//! A return is stamped with the later date of each consecutive pair, so a
//! series built from `n` bars holds `n - 1` points.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::error::MarketLensError;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnSeries {
    pub points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(points: Vec<ReturnPoint>) -> Self {
        Self { points }
    }

    /// Build from (date, value) pairs that are already in date order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            points: pairs
                .into_iter()
                .map(|(date, value)| ReturnPoint { date, value })
                .collect(),
        }
    }

    /// Close-to-close relative differencing.
    pub fn from_bars(bars: &[OhlcvBar]) -> Result<Self, MarketLensError> {
        let mut points = Vec::with_capacity(bars.len().saturating_sub(1));
        for w in bars.windows(2) {
            let (prev, curr) = (&w[0], &w[1]);
            if curr.date <= prev.date {
                return Err(MarketLensError::Data {
                    reason: format!(
                        "{}: dates not strictly increasing at {}",
                        curr.symbol, curr.date
                    ),
                });
            }
            if prev.close <= 0.0 {
                return Err(MarketLensError::Data {
                    reason: format!("{}: non-positive close on {}", prev.symbol, prev.date),
                });
            }
            points.push(ReturnPoint {
                date: curr.date,
                value: curr.close / prev.close - 1.0,
            });
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }
}

/// Restrict two series to their common dates, keeping `left` order.
pub fn align(left: &ReturnSeries, right: &ReturnSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
    let lookup: HashMap<NaiveDate, f64> = right.points.iter().map(|p| (p.date, p.value)).collect();

    let mut dates = Vec::new();
    let mut lv = Vec::new();
    let mut rv = Vec::new();
    for p in &left.points {
        if let Some(&v) = lookup.get(&p.date) {
            dates.push(p.date);
            lv.push(p.value);
            rv.push(v);
        }
    }
    (dates, lv, rv)
}
