//! Predictive model capability interface, concrete variants, and the
//! caller-owned model registry.

use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::error::MarketLensError;
use crate::domain::features::{FEATURE_NAMES, PredictionHorizon};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("normal equations are singular; try a positive ridge_alpha")]
    Singular,
}

/// A model that maps one feature row to one expected-return forecast.
pub trait Model: fmt::Debug {
    fn name(&self) -> &str;

    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<(), ModelError>;

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Clone)]
struct LinearFit {
    intercept: f64,
    weights: Array1<f64>,
    means: Array1<f64>,
    scales: Array1<f64>,
}

/// Least squares on standardized features, with an optional L2 penalty.
/// Weights are reported in standardized units so they double as importances.
#[derive(Debug, Clone)]
pub struct LinearModel {
    name: String,
    ridge_alpha: f64,
    fit: Option<LinearFit>,
}

impl LinearModel {
    pub fn ols() -> Self {
        LinearModel {
            name: "linear".to_string(),
            ridge_alpha: 0.0,
            fit: None,
        }
    }

    pub fn ridge(alpha: f64) -> Self {
        LinearModel {
            name: "ridge".to_string(),
            ridge_alpha: alpha.max(0.0),
            fit: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }
}

/// Stack feature rows into an `n x p` design matrix, rejecting ragged rows.
pub fn design_matrix(features: &[Vec<f64>]) -> Result<Array2<f64>, ModelError> {
    let p = features.first().map_or(0, Vec::len);
    if let Some(bad) = features.iter().find(|row| row.len() != p) {
        return Err(ModelError::DimensionMismatch {
            expected: p,
            found: bad.len(),
        });
    }
    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    let found = flat.len();
    Array2::from_shape_vec((features.len(), p), flat).map_err(|_| ModelError::DimensionMismatch {
        expected: features.len() * p,
        found,
    })
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() <= 1e-10 * scale {
            return Err(ModelError::Singular);
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        let pivot_row = a.row(col).to_owned();
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<(), ModelError> {
        if features.is_empty() || target.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.len() != target.len() {
            return Err(ModelError::DimensionMismatch {
                expected: features.len(),
                found: target.len(),
            });
        }
        let x = design_matrix(features)?;

        let means = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let scales = x
            .var_axis(Axis(0), 0.0)
            .mapv(|var| if var > 0.0 { var.sqrt() } else { 1.0 });
        let standardized = (&x - &means) / &scales;

        let y = ArrayView1::from(target);
        let y_mean = y.mean().ok_or(ModelError::EmptyTrainingSet)?;
        let centered = &y - y_mean;

        let xt = standardized.t();
        let mut xtx = xt.dot(&standardized);
        xtx.diag_mut().map_inplace(|d| *d += self.ridge_alpha);
        let xty = xt.dot(&centered);

        let weights = solve(xtx, xty)?;
        self.fit = Some(LinearFit {
            intercept: y_mean,
            weights,
            means,
            scales,
        });
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let fit = self.fit.as_ref().ok_or(ModelError::NotFitted)?;
        if features.len() != fit.weights.len() {
            return Err(ModelError::DimensionMismatch {
                expected: fit.weights.len(),
                found: features.len(),
            });
        }
        let row = ArrayView1::from(features);
        let standardized = (&row - &fit.means) / &fit.scales;
        Ok(standardized.dot(&fit.weights) + fit.intercept)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.fit.as_ref().map(|f| f.weights.to_vec())
    }
}

/// Equal-weight mean of its members' predictions.
#[derive(Debug)]
pub struct AverageEnsemble {
    members: Vec<Box<dyn Model>>,
}

impl AverageEnsemble {
    pub fn new(members: Vec<Box<dyn Model>>) -> Self {
        AverageEnsemble { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Model for AverageEnsemble {
    fn name(&self) -> &str {
        "ensemble"
    }

    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<(), ModelError> {
        self.members
            .iter_mut()
            .try_for_each(|m| m.fit(features, target))
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if self.members.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let mut sum = 0.0;
        for member in &self.members {
            sum += member.predict(features)?;
        }
        Ok(sum / self.members.len() as f64)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        let all: Vec<Vec<f64>> = self
            .members
            .iter()
            .filter_map(|m| m.feature_importance())
            .collect();
        let width = all.first()?.len();
        if all.iter().any(|w| w.len() != width) {
            return None;
        }
        Some(
            (0..width)
                .map(|j| all.iter().map(|w| w[j]).sum::<f64>() / all.len() as f64)
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelKind {
    #[default]
    Linear,
    Ridge,
    Ensemble,
}

impl ModelKind {
    pub fn build(&self, ridge_alpha: f64) -> Box<dyn Model> {
        match self {
            ModelKind::Linear => Box::new(LinearModel::ols()),
            ModelKind::Ridge => Box::new(LinearModel::ridge(ridge_alpha)),
            ModelKind::Ensemble => Box::new(AverageEnsemble::new(vec![
                Box::new(LinearModel::ridge(ridge_alpha)),
                Box::new(LinearModel::ridge(ridge_alpha * 10.0)),
            ])),
        }
    }
}

impl FromStr for ModelKind {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" | "ols" => Ok(ModelKind::Linear),
            "ridge" => Ok(ModelKind::Ridge),
            "ensemble" => Ok(ModelKind::Ensemble),
            other => Err(MarketLensError::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Linear => write!(f, "linear"),
            ModelKind::Ridge => write!(f, "ridge"),
            ModelKind::Ensemble => write!(f, "ensemble"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub rank: usize,
    pub feature: String,
    pub importance: f64,
}

/// Rank features by absolute weight, largest first, with 1-based ranks.
pub fn rank_feature_importance(names: &[String], weights: &[f64]) -> Vec<FeatureImportance> {
    let mut pairs: Vec<(&String, f64)> = names.iter().zip(weights.iter().copied()).collect();
    pairs.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (name, w))| FeatureImportance {
            rank: i + 1,
            feature: name.clone(),
            importance: w,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub symbol: String,
    pub kind: ModelKind,
    pub horizon: PredictionHorizon,
}

impl ModelKey {
    pub fn new(symbol: &str, kind: ModelKind, horizon: PredictionHorizon) -> Self {
        ModelKey {
            symbol: symbol.to_string(),
            kind,
            horizon,
        }
    }
}

#[derive(Debug)]
pub struct RegisteredModel {
    pub model: Box<dyn Model>,
    pub feature_names: Vec<String>,
}

impl RegisteredModel {
    /// Pick this model's training columns out of a full feature row.
    pub fn project(&self, row: &[f64]) -> Vec<f64> {
        self.feature_names
            .iter()
            .filter_map(|name| FEATURE_NAMES.iter().position(|f| f == name))
            .filter_map(|j| row.get(j).copied())
            .collect()
    }
}

/// Trained models keyed by (symbol, kind, horizon).
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: HashMap<ModelKey, RegisteredModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a model, replacing any previous entry under the same key.
    pub fn register(&mut self, key: ModelKey, model: Box<dyn Model>, feature_names: Vec<String>) {
        self.entries.insert(
            key,
            RegisteredModel {
                model,
                feature_names,
            },
        );
    }

    pub fn get(&self, key: &ModelKey) -> Option<&RegisteredModel> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
