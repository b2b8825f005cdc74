//! Position sizing: raw predictions to bounded exposures in [-1, 1].

use std::fmt;
use std::str::FromStr;

use crate::domain::error::MarketLensError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationMethod {
    /// Standardize over the valid predictions, clip to [-1, 1]. Falls back
    /// to the sign when the predictions have no dispersion.
    #[default]
    ZScore,
    Sign,
}

impl FromStr for NormalizationMethod {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z-score" => Ok(NormalizationMethod::ZScore),
            "sign" => Ok(NormalizationMethod::Sign),
            other => Err(MarketLensError::UnknownNormalization(other.to_string())),
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMethod::ZScore => write!(f, "zscore"),
            NormalizationMethod::Sign => write!(f, "sign"),
        }
    }
}

fn valid(p: Option<f64>) -> Option<f64> {
    p.filter(|v| v.is_finite())
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Map predictions to positions. Missing or non-finite predictions get 0.
pub fn predictions_to_positions(
    predictions: &[Option<f64>],
    method: NormalizationMethod,
) -> Vec<f64> {
    let cleaned: Vec<f64> = predictions.iter().filter_map(|&p| valid(p)).collect();
    if cleaned.is_empty() {
        return vec![0.0; predictions.len()];
    }

    let scale = match method {
        NormalizationMethod::Sign => None,
        NormalizationMethod::ZScore => {
            let n = cleaned.len() as f64;
            let mean = cleaned.iter().sum::<f64>() / n;
            let std = if cleaned.len() > 1 {
                (cleaned.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            // rounding noise on identical values must not read as dispersion
            let magnitude = cleaned.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            (std > 1e-12 * magnitude).then_some((mean, std))
        }
    };

    predictions
        .iter()
        .map(|&p| match valid(p) {
            None => 0.0,
            Some(v) => match scale {
                Some((mean, std)) => ((v - mean) / std).clamp(-1.0, 1.0),
                None => sign(v),
            },
        })
        .collect()
}
