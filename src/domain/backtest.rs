//! Single-asset static backtest.
//!
//! Positions decided at step t earn the return of step t+1. Step 0 only
//! opens: equity starts at initial capital on the date of the first return
//! and nothing is charged or earned there.

use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::cost::CostModel;
use crate::domain::error::MarketLensError;
use crate::domain::metrics::{DEFAULT_RISK_FREE_RATE, MetricsError, MetricsReport, summary_with_rate};
use crate::domain::portfolio::EquityPoint;
use crate::domain::returns::{ReturnSeries, align};
use crate::domain::sizing::{NormalizationMethod, predictions_to_positions};

/// How the single-asset backtest obtains its predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BacktestMode {
    /// Fit once on the leading `train_fraction`, predict the rest.
    #[default]
    Static,
    WalkForward,
}

impl FromStr for BacktestMode {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "static" => Ok(BacktestMode::Static),
            "walk-forward" => Ok(BacktestMode::WalkForward),
            other => Err(MarketLensError::ConfigInvalid {
                section: "backtest".into(),
                key: "mode".into(),
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub cost: CostModel,
    pub risk_free_rate: f64,
    pub normalization: NormalizationMethod,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            cost: CostModel::default(),
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            normalization: NormalizationMethod::ZScore,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub positions: Vec<f64>,
    /// Net returns for steps 1..n, stamped with their dates.
    pub net_returns: ReturnSeries,
    /// Cost charged at each of steps 1..n.
    pub costs: Vec<f64>,
    pub metrics: MetricsReport,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.equity)
    }

    pub fn total_cost(&self) -> f64 {
        self.costs.iter().sum()
    }
}

/// Replay `positions` against `returns`. Returns per-step net returns,
/// costs, and equity values (the latter including the opening value).
pub fn replay(
    returns: &[f64],
    positions: &[f64],
    cost: &CostModel,
    initial_capital: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let steps = returns.len().min(positions.len());
    let mut net = Vec::with_capacity(steps.saturating_sub(1));
    let mut costs = Vec::with_capacity(steps.saturating_sub(1));
    let mut equity = Vec::with_capacity(steps);

    if steps == 0 {
        return (net, costs, equity);
    }

    let mut value = initial_capital;
    equity.push(value);
    for t in 1..steps {
        let gross = positions[t - 1] * returns[t];
        let c = cost.cost(positions[t], positions[t - 1]);
        // a step loses at most the whole account, so equity stops at zero
        let r = (gross - c).max(-1.0);
        value *= 1.0 + r;
        net.push(r);
        costs.push(c);
        equity.push(value);
    }
    (net, costs, equity)
}

/// Run the prediction-driven strategy over `returns`.
///
/// `predictions[t]` is the forecast available at the close of step t; it
/// must be index-aligned with `returns`.
pub fn run_backtest(
    returns: &ReturnSeries,
    predictions: &[Option<f64>],
    config: &BacktestConfig,
    benchmark: Option<&ReturnSeries>,
) -> Result<BacktestResult, MarketLensError> {
    if predictions.len() != returns.len() {
        return Err(MarketLensError::LengthMismatch {
            context: "predictions vs returns".into(),
            left: predictions.len(),
            right: returns.len(),
        });
    }
    if returns.len() < 2 {
        return Err(MetricsError::EmptySeries.into());
    }

    let positions = predictions_to_positions(predictions, config.normalization);
    let values = returns.values();
    let (net, costs, equity) = replay(&values, &positions, &config.cost, config.initial_capital);

    let dates = returns.dates();
    let equity_curve: Vec<EquityPoint> = dates
        .iter()
        .zip(&equity)
        .map(|(&date, &equity)| EquityPoint { date, equity })
        .collect();
    let net_returns = ReturnSeries::from_pairs(dates[1..].iter().copied().zip(net));

    let metrics = match benchmark {
        None => summary_with_rate(&net_returns.values(), None, config.risk_free_rate)?,
        Some(bench) => {
            let (common, strategy, bench_values) = align(&net_returns, bench);
            if common.is_empty() {
                return Err(MarketLensError::Data {
                    reason: "benchmark shares no dates with the backtest".into(),
                });
            }
            debug!(common = common.len(), "aligned benchmark");
            summary_with_rate(&strategy, Some(&bench_values), config.risk_free_rate)?
        }
    };

    let result = BacktestResult {
        equity_curve,
        positions,
        net_returns,
        costs,
        metrics,
    };
    info!(
        steps = returns.len(),
        final_equity = result.final_equity(),
        total_cost = result.total_cost(),
        "static backtest complete"
    );
    Ok(result)
}
