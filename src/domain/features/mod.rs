//! Causal feature frames and labelled training datasets.
//!
//! Features at row `i` only read bars `0..=i`, so a frame built once over
//! the full history agrees with one built on any prefix. The simulator
//! relies on this to compute features a single time per asset.

pub mod indicators;

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::MarketLensError;
use crate::domain::ohlcv::{OhlcvBar, closes};

use indicators::{
    MACD_FAST, MACD_SIGNAL, MACD_SLOW, atr, bollinger_percent_b, macd, pct_change, roc,
    rolling_std, rsi, sma,
};

pub const FEATURE_NAMES: [&str; 14] = [
    "returns_1d",
    "returns_5d",
    "returns_20d",
    "close_sma_5",
    "close_sma_10",
    "close_sma_20",
    "close_sma_50",
    "rsi_14",
    "roc_12",
    "macd_hist",
    "bb_percent_b",
    "atr_14",
    "volatility_20",
    "volume_ratio",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PredictionHorizon {
    #[default]
    OneDay,
    FiveDays,
    TwentyDays,
    SixtyDays,
}

impl PredictionHorizon {
    /// Number of bars between the decision and the target close.
    pub fn periods(&self) -> usize {
        match self {
            PredictionHorizon::OneDay => 1,
            PredictionHorizon::FiveDays => 5,
            PredictionHorizon::TwentyDays => 20,
            PredictionHorizon::SixtyDays => 60,
        }
    }
}

impl FromStr for PredictionHorizon {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(PredictionHorizon::OneDay),
            "5d" => Ok(PredictionHorizon::FiveDays),
            "20d" => Ok(PredictionHorizon::TwentyDays),
            "60d" => Ok(PredictionHorizon::SixtyDays),
            other => Err(MarketLensError::UnknownHorizon(other.to_string())),
        }
    }
}

impl fmt::Display for PredictionHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.periods())
    }
}

/// One feature row per bar; `None` where any feature is undefined.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    rows: Vec<Option<Vec<f64>>>,
    valid_through: Vec<usize>,
}

impl FeatureFrame {
    pub fn names(&self) -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index)?.as_deref()
    }

    /// Count of valid rows in `0..=index`.
    pub fn valid_rows_through(&self, index: usize) -> usize {
        self.valid_through
            .get(index)
            .or(self.valid_through.last())
            .copied()
            .unwrap_or(0)
    }
}

fn ratio_minus_one(num: f64, den: Option<f64>) -> Option<f64> {
    den.filter(|d| *d != 0.0).map(|d| num / d - 1.0)
}

/// Compute the feature frame for a single symbol's bars.
pub fn build_features(bars: &[OhlcvBar]) -> FeatureFrame {
    let close = closes(bars);
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let r1 = pct_change(&close, 1);
    let r5 = pct_change(&close, 5);
    let r20 = pct_change(&close, 20);
    let sma_windows: Vec<Vec<Option<f64>>> =
        [5, 10, 20, 50].iter().map(|&p| sma(&close, p)).collect();
    let rsi14 = rsi(&close, 14);
    let roc12 = roc(&close, 12);
    let macd_points = macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let percent_b = bollinger_percent_b(&close, 20, 2.0);
    let atr14 = atr(bars, 14);
    let volume_sma = sma(&volume, 20);

    // Volatility of one-period returns; the first return is undefined.
    let r1_values: Vec<f64> = r1.iter().skip(1).map(|v| v.unwrap_or(f64::NAN)).collect();
    let mut vol20 = vec![None];
    vol20.extend(rolling_std(&r1_values, 20));

    let mut rows = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let c = close[i];
        let row = (|| {
            let mut row = vec![r1[i]?, r5[i]?, r20[i]?];
            for window in &sma_windows {
                row.push(ratio_minus_one(c, window[i])?);
            }
            row.push(rsi14[i]?);
            row.push(roc12[i]?);
            row.push(macd_points[i]?.histogram / c);
            row.push(percent_b[i]?);
            row.push(atr14[i]? / c);
            row.push(vol20[i]?);
            let avg_volume = volume_sma[i]?;
            row.push(if avg_volume > 0.0 {
                volume[i] / avg_volume
            } else {
                1.0
            });
            Some(row)
        })();
        rows.push(row.filter(|r| r.iter().all(|v| v.is_finite())));
    }

    let mut count = 0;
    let valid_through = rows
        .iter()
        .map(|r| {
            count += usize::from(r.is_some());
            count
        })
        .collect();

    FeatureFrame {
        dates: bars.iter().map(|b| b.date).collect(),
        rows,
        valid_through,
    }
}

/// Valid feature rows paired with the forward target at a horizon and the
/// realized one-period return of the same row.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub horizon: PredictionHorizon,
    pub feature_names: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub features: Vec<Vec<f64>>,
    /// close[t+h] / close[t] - 1
    pub targets: Vec<f64>,
    /// close[t] / close[t-1] - 1
    pub realized: Vec<f64>,
}

impl LabeledDataset {
    pub fn from_bars(bars: &[OhlcvBar], horizon: PredictionHorizon) -> Self {
        let frame = build_features(bars);
        Self::from_frame(bars, &frame, horizon)
    }

    pub fn from_frame(bars: &[OhlcvBar], frame: &FeatureFrame, horizon: PredictionHorizon) -> Self {
        let h = horizon.periods();
        let mut dataset = LabeledDataset {
            horizon,
            feature_names: frame.names(),
            dates: Vec::new(),
            features: Vec::new(),
            targets: Vec::new(),
            realized: Vec::new(),
        };

        for i in 1..bars.len().saturating_sub(h) {
            let Some(row) = frame.row(i) else { continue };
            let target = bars[i + h].close / bars[i].close - 1.0;
            let realized = bars[i].close / bars[i - 1].close - 1.0;
            if !target.is_finite() || !realized.is_finite() {
                continue;
            }
            dataset.dates.push(bars[i].date);
            dataset.features.push(row.to_vec());
            dataset.targets.push(target);
            dataset.realized.push(realized);
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Rows dated on or before `end`.
    pub fn truncate_after(&mut self, end: NaiveDate) {
        let keep = self.dates.partition_point(|d| *d <= end);
        self.dates.truncate(keep);
        self.features.truncate(keep);
        self.targets.truncate(keep);
        self.realized.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(n: usize) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 4.0 + i as f64 * 0.05;
                OhlcvBar {
                    symbol: "TEST".into(),
                    date: start + chrono::Duration::days(i as i64),
                    open: close - 0.2,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0 + (i % 7) as f64 * 100.0,
                }
            })
            .collect()
    }

    #[test]
    fn horizon_parse_and_display() {
        assert_eq!("5d".parse::<PredictionHorizon>().unwrap(), PredictionHorizon::FiveDays);
        assert_eq!("60D".parse::<PredictionHorizon>().unwrap().periods(), 60);
        assert_eq!(PredictionHorizon::TwentyDays.to_string(), "20d");
        assert!(matches!(
            "2w".parse::<PredictionHorizon>(),
            Err(MarketLensError::UnknownHorizon(_))
        ));
    }

    #[test]
    fn frame_warmup_is_sma50() {
        let bars = make_bars(80);
        let frame = build_features(&bars);
        assert_eq!(frame.len(), 80);
        assert!(frame.row(48).is_none());
        let row = frame.row(49).unwrap();
        assert_eq!(row.len(), FEATURE_NAMES.len());
        assert_eq!(frame.valid_rows_through(48), 0);
        assert_eq!(frame.valid_rows_through(79), 31);
        assert_eq!(frame.valid_rows_through(500), 31);
    }

    #[test]
    fn frame_is_prefix_stable() {
        let bars = make_bars(90);
        let full = build_features(&bars);
        let prefix = build_features(&bars[..70]);
        for i in 0..70 {
            assert_eq!(full.row(i), prefix.row(i));
        }
    }

    #[test]
    fn too_short_history_has_no_rows() {
        let frame = build_features(&make_bars(30));
        assert_eq!(frame.valid_rows_through(29), 0);
    }

    #[test]
    fn zero_volume_keeps_rows_valid() {
        let mut bars = make_bars(60);
        for bar in &mut bars {
            bar.volume = 0.0;
        }
        let frame = build_features(&bars);
        assert_eq!(frame.row(59).unwrap()[13], 1.0);
    }

    #[test]
    fn labeled_dataset_targets() {
        let bars = make_bars(80);
        let ds = LabeledDataset::from_bars(&bars, PredictionHorizon::FiveDays);
        // rows 49..75 have a 5-bar forward close
        assert_eq!(ds.len(), 26);
        assert_eq!(ds.dates[0], bars[49].date);
        let expected = bars[54].close / bars[49].close - 1.0;
        assert!((ds.targets[0] - expected).abs() < 1e-12);
        let realized = bars[49].close / bars[48].close - 1.0;
        assert!((ds.realized[0] - realized).abs() < 1e-12);
        assert_eq!(ds.feature_names.len(), ds.features[0].len());
    }

    #[test]
    fn truncate_after_date() {
        let bars = make_bars(80);
        let mut ds = LabeledDataset::from_bars(&bars, PredictionHorizon::OneDay);
        ds.truncate_after(bars[59].date);
        assert_eq!(ds.len(), 11);
        assert_eq!(ds.targets.len(), 11);
        assert_eq!(*ds.dates.last().unwrap(), bars[59].date);
    }
}
