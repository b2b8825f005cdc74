//! Latest-bar forecasts mapped to BUY/SELL/HOLD signals.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::asset_data::AssetData;
use crate::domain::error::MarketLensError;
use crate::domain::features::PredictionHorizon;
use crate::domain::model::{FeatureImportance, ModelKey, ModelKind, ModelRegistry, rank_feature_importance};

/// Forecast returns strictly beyond this magnitude are directional.
pub const SIGNAL_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Signal and confidence for a forecast return.
///
/// Directional confidence grows with the forecast, `min(|p| * 10, 1)`.
/// HOLD confidence shrinks with it, `1 - |p| * 5`.
pub fn classify(predicted_return: f64) -> (Signal, f64) {
    let magnitude = predicted_return.abs();
    if predicted_return > SIGNAL_THRESHOLD {
        (Signal::Buy, (magnitude * 10.0).min(1.0))
    } else if predicted_return < -SIGNAL_THRESHOLD {
        (Signal::Sell, (magnitude * 10.0).min(1.0))
    } else {
        (Signal::Hold, 1.0 - magnitude * 5.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub symbol: String,
    pub date: NaiveDate,
    pub model: String,
    pub horizon: String,
    pub predicted_return: f64,
    pub signal: Signal,
    pub confidence: f64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub features_used: usize,
    pub top_features: Vec<FeatureImportance>,
}

/// Forecast from the asset's most recent bar with its registered model.
pub fn predict_latest(
    asset: &AssetData,
    registry: &ModelRegistry,
    kind: ModelKind,
    horizon: PredictionHorizon,
    top_n: usize,
) -> Result<Prediction, MarketLensError> {
    let Some(last) = asset.ohlcv.last() else {
        return Err(MarketLensError::NoData {
            symbol: asset.symbol.clone(),
        });
    };
    let index = asset.ohlcv.len() - 1;
    let entry = registry
        .get(&ModelKey::new(&asset.symbol, kind, horizon))
        .ok_or_else(|| MarketLensError::Data {
            reason: format!("{}: no trained {kind} model for {horizon}", asset.symbol),
        })?;
    let row = asset.features.row(index).ok_or_else(|| MarketLensError::Data {
        reason: format!("{}: no complete feature row on {}", asset.symbol, last.date),
    })?;

    let predicted_return = entry.model.predict(&entry.project(row))?;
    if !predicted_return.is_finite() {
        return Err(MarketLensError::Data {
            reason: format!("{}: non-finite forecast {predicted_return}", asset.symbol),
        });
    }
    let (signal, confidence) = classify(predicted_return);

    let mut top_features = entry
        .model
        .feature_importance()
        .map(|weights| rank_feature_importance(&entry.feature_names, &weights))
        .unwrap_or_default();
    top_features.truncate(top_n);

    Ok(Prediction {
        symbol: asset.symbol.clone(),
        date: last.date,
        model: kind.to_string(),
        horizon: horizon.to_string(),
        predicted_return,
        signal,
        confidence,
        current_price: last.close,
        predicted_price: last.close * (1.0 + predicted_return),
        features_used: entry.feature_names.len(),
        top_features,
    })
}
