//! Domain error types.

use crate::domain::metrics::MetricsError;
use crate::domain::model::ModelError;

/// Top-level error type for marketlens.
#[derive(Debug, thiserror::Error)]
pub enum MarketLensError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown cost method: {0}")]
    UnknownCostMethod(String),

    #[error("unknown normalization method: {0}")]
    UnknownNormalization(String),

    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    #[error("unknown prediction horizon: {0}")]
    UnknownHorizon(String),

    #[error("unknown rebalance frequency: {0}")]
    UnknownRebalanceFrequency(String),

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("base asset missing: {0}")]
    BaseAssetMissing(String),

    #[error("{context}: length mismatch ({left} vs {right})")]
    LengthMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&MarketLensError> for std::process::ExitCode {
    fn from(err: &MarketLensError) -> Self {
        let code: u8 = match err {
            MarketLensError::Io(_) | MarketLensError::Json(_) => 1,
            MarketLensError::ConfigParse { .. }
            | MarketLensError::ConfigMissing { .. }
            | MarketLensError::ConfigInvalid { .. }
            | MarketLensError::UnknownCostMethod(_)
            | MarketLensError::UnknownNormalization(_)
            | MarketLensError::UnknownModelType(_)
            | MarketLensError::UnknownHorizon(_)
            | MarketLensError::UnknownRebalanceFrequency(_) => 2,
            MarketLensError::Data { .. } => 3,
            MarketLensError::NoData { .. }
            | MarketLensError::InsufficientData { .. }
            | MarketLensError::BaseAssetMissing(_) => 5,
            MarketLensError::LengthMismatch { .. }
            | MarketLensError::Metrics(_)
            | MarketLensError::Model(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
