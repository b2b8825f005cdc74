//! Transaction cost and slippage, charged on turnover.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::MarketLensError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostMethod {
    /// |Δposition| * (cost_rate + slippage_rate)
    #[default]
    Turnover,
    /// Frictionless execution.
    Zero,
}

impl FromStr for CostMethod {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "turnover" => Ok(CostMethod::Turnover),
            "zero" | "none" => Ok(CostMethod::Zero),
            other => Err(MarketLensError::UnknownCostMethod(other.to_string())),
        }
    }
}

impl fmt::Display for CostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostMethod::Turnover => write!(f, "turnover"),
            CostMethod::Zero => write!(f, "zero"),
        }
    }
}

/// Cost of moving from `previous` to `position`, as a fraction of equity.
pub fn transaction_cost(position: f64, previous: f64, cost_rate: f64, slippage_rate: f64) -> f64 {
    (position - previous).abs() * (cost_rate + slippage_rate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub method: CostMethod,
    pub cost_rate: f64,
    pub slippage_rate: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            method: CostMethod::Turnover,
            cost_rate: 0.001,
            slippage_rate: 0.0005,
        }
    }
}

impl CostModel {
    pub fn frictionless() -> Self {
        CostModel {
            method: CostMethod::Zero,
            cost_rate: 0.0,
            slippage_rate: 0.0,
        }
    }

    pub fn cost(&self, position: f64, previous: f64) -> f64 {
        match self.method {
            CostMethod::Turnover => {
                transaction_cost(position, previous, self.cost_rate, self.slippage_rate)
            }
            CostMethod::Zero => 0.0,
        }
    }
}
