//! Descriptive analysis of one or more price histories: price statistics,
//! return moments, the latest indicator readings and cross-asset return
//! correlation on common dates.

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::error::MarketLensError;
use crate::domain::features::indicators::{
    MACD_FAST, MACD_SIGNAL, MACD_SLOW, macd, rolling_std, rsi, sma,
};
use crate::domain::metrics::{TRADING_DAYS_PER_YEAR, total_return};
use crate::domain::ohlcv::{OhlcvBar, closes};
use crate::domain::returns::ReturnSeries;

/// Variance at or below this is treated as zero.
const VARIANCE_EPSILON: f64 = 1e-24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStatistics {
    pub mean_price: f64,
    pub current_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Sample standard deviation of the closes.
    pub price_std: f64,
    pub data_points: usize,
}

pub fn price_statistics(symbol: &str, bars: &[OhlcvBar]) -> Result<PriceStatistics, MarketLensError> {
    let close = closes(bars);
    let view = ArrayView1::from(&close[..]);
    let (Some(mean), Some(current)) = (view.mean(), close.last().copied()) else {
        return Err(MarketLensError::NoData {
            symbol: symbol.to_string(),
        });
    };
    Ok(PriceStatistics {
        mean_price: mean,
        current_price: current,
        min_price: view.fold(f64::INFINITY, |acc, v| acc.min(*v)),
        max_price: view.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v)),
        price_std: if close.len() > 1 { view.std(1.0) } else { 0.0 },
        data_points: bars.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnsSummary {
    pub mean_return: f64,
    pub total_return: f64,
    pub annual_volatility: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
}

/// Central moment sums `(m2, m3, m4)` about the mean.
fn central_moment_sums(values: &[f64]) -> (f64, f64, f64) {
    let view = ArrayView1::from(values);
    let mean = view.mean().unwrap_or(0.0);
    view.fold((0.0, 0.0, 0.0), |(m2, m3, m4), v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    })
}

/// Bias-adjusted sample skewness; 0.0 below three points or with no spread.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return 0.0;
    }
    let (m2, m3, _) = central_moment_sums(values);
    let (m2, m3) = (m2 / n, m3 / n);
    if m2 <= VARIANCE_EPSILON {
        return 0.0;
    }
    (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
}

/// Bias-adjusted sample excess kurtosis; 0.0 below four points or with no spread.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return 0.0;
    }
    let (m2, _, m4) = central_moment_sums(values);
    if m2 / n <= VARIANCE_EPSILON {
        return 0.0;
    }
    let scale = (n - 2.0) * (n - 3.0);
    n * (n + 1.0) * (n - 1.0) * m4 / (scale * m2 * m2) - 3.0 * (n - 1.0).powi(2) / scale
}

pub fn returns_summary(symbol: &str, bars: &[OhlcvBar]) -> Result<ReturnsSummary, MarketLensError> {
    let returns = ReturnSeries::from_bars(bars)?.values();
    if returns.is_empty() {
        return Err(MarketLensError::InsufficientData {
            symbol: symbol.to_string(),
            bars: bars.len(),
            minimum: 2,
        });
    }
    let view = ArrayView1::from(&returns[..]);
    let volatility = if returns.len() > 1 { view.std(1.0) } else { 0.0 };
    Ok(ReturnsSummary {
        mean_return: view.mean().unwrap_or(0.0),
        total_return: total_return(&returns),
        annual_volatility: volatility * TRADING_DAYS_PER_YEAR.sqrt(),
        skewness: skewness(&returns),
        kurtosis: excess_kurtosis(&returns),
    })
}

/// Indicator readings at the last bar; `None` until an indicator has warmed up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
}

pub fn latest_indicators(bars: &[OhlcvBar]) -> Option<IndicatorSnapshot> {
    let last = bars.len().checked_sub(1)?;
    let close = closes(bars);
    let macd_point = macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL)[last];
    let middle = sma(&close, 20)[last];
    let band = rolling_std(&close, 20)[last].map(|s| 2.0 * s);

    Some(IndicatorSnapshot {
        date: bars[last].date,
        rsi_14: rsi(&close, 14)[last],
        macd: macd_point.map(|p| p.line),
        macd_signal: macd_point.map(|p| p.signal),
        bb_upper: middle.zip(band).map(|(m, b)| m + b),
        bb_middle: middle,
        bb_lower: middle.zip(band).map(|(m, b)| m - b),
        sma_20: middle,
        sma_50: sma(&close, 50)[last],
    })
}

/// Pearson correlation of daily returns over the dates every symbol shares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub observations: usize,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[i][j])
    }

    /// Correlations of `symbol` with every other symbol.
    pub fn row_for(&self, symbol: &str) -> BTreeMap<String, f64> {
        let Some(i) = self.symbols.iter().position(|s| s == symbol) else {
            return BTreeMap::new();
        };
        self.symbols
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| (other.clone(), self.values[i][j]))
            .collect()
    }
}

/// A symbol with no return variance correlates 0 with the others.
pub fn correlation_matrix(series: &[(String, ReturnSeries)]) -> Result<CorrelationMatrix, MarketLensError> {
    let mut common: Option<BTreeSet<NaiveDate>> = None;
    for (_, s) in series {
        let dates: BTreeSet<NaiveDate> = s.dates().into_iter().collect();
        common = Some(match common {
            Some(acc) => acc.intersection(&dates).copied().collect(),
            None => dates,
        });
    }
    let dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();
    if dates.len() < 2 {
        return Err(MarketLensError::Data {
            reason: format!("correlation needs two common return dates, found {}", dates.len()),
        });
    }

    let (n, k) = (dates.len(), series.len());
    let mut data = Array2::<f64>::zeros((n, k));
    for (j, (_, s)) in series.iter().enumerate() {
        let lookup: HashMap<NaiveDate, f64> = s.points.iter().map(|p| (p.date, p.value)).collect();
        for (i, date) in dates.iter().enumerate() {
            data[[i, j]] = lookup.get(date).copied().unwrap_or(0.0);
        }
    }

    let means = data.mean_axis(Axis(0)).ok_or_else(|| MarketLensError::Data {
        reason: "correlation over an empty sample".to_string(),
    })?;
    let centered = &data - &means;
    let cov = centered.t().dot(&centered) / (n as f64 - 1.0);

    let mut corr = Array2::<f64>::eye(k);
    for i in 0..k {
        for j in (i + 1)..k {
            let spread = cov[[i, i]] * cov[[j, j]];
            let value = if spread > VARIANCE_EPSILON {
                (cov[[i, j]] / spread.sqrt()).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr[[i, j]] = value;
            corr[[j, i]] = value;
        }
    }

    Ok(CorrelationMatrix {
        symbols: series.iter().map(|(s, _)| s.clone()).collect(),
        observations: n,
        values: corr.outer_iter().map(|row| row.to_vec()).collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetAnalysis {
    pub symbol: String,
    pub statistics: PriceStatistics,
    pub returns_summary: ReturnsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlations: Option<BTreeMap<String, f64>>,
    pub indicators: Option<IndicatorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub assets: Vec<AssetAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub correlations: bool,
    pub indicators: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            correlations: true,
            indicators: true,
        }
    }
}

/// Analyze every history; correlations need two or more of them.
pub fn analyze_assets(
    histories: &[(String, Vec<OhlcvBar>)],
    options: &AnalysisOptions,
) -> Result<AnalysisReport, MarketLensError> {
    let correlation = if options.correlations && histories.len() > 1 {
        let series = histories
            .iter()
            .map(|(symbol, bars)| Ok((symbol.clone(), ReturnSeries::from_bars(bars)?)))
            .collect::<Result<Vec<_>, MarketLensError>>()?;
        Some(correlation_matrix(&series)?)
    } else {
        None
    };

    let mut assets = Vec::with_capacity(histories.len());
    for (symbol, bars) in histories {
        assets.push(AssetAnalysis {
            symbol: symbol.clone(),
            statistics: price_statistics(symbol, bars)?,
            returns_summary: returns_summary(symbol, bars)?,
            correlations: correlation.as_ref().map(|m| m.row_for(symbol)),
            indicators: if options.indicators {
                latest_indicators(bars)
            } else {
                None
            },
        });
    }
    Ok(AnalysisReport { assets, correlation })
}
