//! Walk-forward evaluation with periodic retraining.
//!
//! At each step start `i` the model only sees rows whose forward target is
//! already known, i.e. rows `[0, i + 1 - h)` for horizon `h`. Predictions
//! for the step are then scored against realized one-period returns through
//! the static engine.

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::error::MarketLensError;
use crate::domain::features::LabeledDataset;
use crate::domain::model::Model;
use crate::domain::returns::ReturnSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalkForwardConfig {
    pub train_size: usize,
    pub step_size: usize,
    pub retrain_frequency: usize,
}

impl WalkForwardConfig {
    /// `train_size` from a fraction of the dataset, with the default step
    /// and retrain cadence.
    pub fn from_fraction(rows: usize, train_fraction: f64) -> Self {
        WalkForwardConfig {
            train_size: ((rows as f64) * train_fraction).floor().max(1.0) as usize,
            step_size: 20,
            retrain_frequency: 60,
        }
    }

    fn validate(&self, rows: usize, horizon: usize) -> Result<(), MarketLensError> {
        let invalid = |key: &str, reason: String| MarketLensError::ConfigInvalid {
            section: "walk_forward".into(),
            key: key.into(),
            reason,
        };
        for (key, value) in [
            ("train_size", self.train_size),
            ("step_size", self.step_size),
            ("retrain_frequency", self.retrain_frequency),
        ] {
            if value == 0 {
                return Err(invalid(key, "must be at least 1".into()));
            }
        }
        if self.train_size >= rows {
            return Err(invalid(
                "train_size",
                format!("{} leaves no rows to test out of {rows}", self.train_size),
            ));
        }
        if self.train_size < horizon {
            return Err(invalid(
                "train_size",
                format!("must cover the {horizon}-period target horizon"),
            ));
        }
        Ok(())
    }
}

pub type WalkForwardMetadata = WalkForwardConfig;

#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardResult {
    pub backtest: BacktestResult,
    pub predictions: Vec<f64>,
    pub actuals: Vec<f64>,
    pub retrain_count: usize,
    pub metadata: WalkForwardMetadata,
}

pub fn run_walk_forward(
    dataset: &LabeledDataset,
    model: &mut dyn Model,
    config: &WalkForwardConfig,
    backtest: &BacktestConfig,
    benchmark: Option<&ReturnSeries>,
) -> Result<WalkForwardResult, MarketLensError> {
    let n = dataset.len();
    let h = dataset.horizon.periods();
    config.validate(n, h)?;

    let mut predictions = Vec::with_capacity(n - config.train_size);
    let mut actuals = Vec::with_capacity(n - config.train_size);
    let mut last_fit: Option<usize> = None;
    let mut retrain_count = 0;

    for start in (config.train_size..n).step_by(config.step_size) {
        let due = last_fit.is_none_or(|at| start - at >= config.retrain_frequency);
        if due {
            let train_end = start + 1 - h;
            model.fit(&dataset.features[..train_end], &dataset.targets[..train_end])?;
            last_fit = Some(start);
            retrain_count += 1;
            debug!(step = start, train_rows = train_end, model = model.name(), "refit");
        }

        let end = (start + config.step_size).min(n);
        for row in start..end {
            predictions.push(model.predict(&dataset.features[row])?);
            actuals.push(dataset.realized[row]);
        }
    }

    let returns = ReturnSeries::from_pairs(
        dataset.dates[config.train_size..]
            .iter()
            .copied()
            .zip(actuals.iter().copied()),
    );
    let wrapped: Vec<Option<f64>> = predictions.iter().copied().map(Some).collect();
    let result = run_backtest(&returns, &wrapped, backtest, benchmark)?;

    info!(
        predictions = predictions.len(),
        retrain_count,
        "walk-forward complete"
    );

    Ok(WalkForwardResult {
        backtest: result,
        predictions,
        actuals,
        retrain_count,
        metadata: *config,
    })
}
