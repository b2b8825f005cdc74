//! Return-based performance and risk statistics.
//!
//! All functions are pure and operate on per-period fractional returns with a
//! fixed period of one trading day. Degenerate inputs (zero variance, zero
//! drawdown, no losing periods) resolve to documented fallback values rather
//! than NaN; the only non-finite output is `profit_factor`'s +infinity.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Dispersion at or below this is treated as zero.
const STD_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("return series is empty")]
    EmptySeries,

    #[error("benchmark has {benchmark} returns but strategy has {returns}")]
    LengthMismatch { returns: usize, benchmark: usize },
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

fn sample_std(values: &[f64]) -> f64 {
    sample_covariance(values, values).max(0.0).sqrt()
}

fn check_benchmark(returns: &[f64], benchmark: &[f64]) -> Result<(), MetricsError> {
    if returns.len() != benchmark.len() {
        return Err(MetricsError::LengthMismatch {
            returns: returns.len(),
            benchmark: benchmark.len(),
        });
    }
    Ok(())
}

fn excess(returns: &[f64], risk_free_rate: f64) -> Vec<f64> {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    returns.iter().map(|r| r - daily_rf).collect()
}

/// sqrt(252) * mean(excess) / std(excess); 0.0 when std is zero.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess(returns, risk_free_rate);
    let std = population_std(&excess);
    if std <= STD_EPSILON {
        return 0.0;
    }
    TRADING_DAYS_PER_YEAR.sqrt() * mean(&excess) / std
}

/// Sharpe numerator over the dispersion of the losing periods only.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_std = population_std(&downside);
    if downside_std <= STD_EPSILON {
        return 0.0;
    }
    let excess = excess(returns, risk_free_rate);
    TRADING_DAYS_PER_YEAR.sqrt() * mean(&excess) / downside_std
}

/// Deepest peak-to-trough decline of the compounded wealth path (<= 0).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for r in returns {
        wealth *= 1.0 + r;
        if wealth > peak {
            peak = wealth;
        }
        let dd = if peak > 0.0 {
            (wealth - peak) / peak
        } else {
            -1.0
        };
        if dd < worst {
            worst = dd;
        }
    }

    worst
}

/// Compounded growth over the whole series minus one.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// Geometric annualization; an empty series has no defined period count.
pub fn annual_return(returns: &[f64]) -> Result<f64, MetricsError> {
    if returns.is_empty() {
        return Err(MetricsError::EmptySeries);
    }
    let growth = 1.0 + total_return(returns);
    if growth <= 0.0 {
        return Ok(-1.0);
    }
    Ok(growth.powf(TRADING_DAYS_PER_YEAR / returns.len() as f64) - 1.0)
}

pub fn calmar_ratio(returns: &[f64]) -> Result<f64, MetricsError> {
    let annual = annual_return(returns)?;
    let dd = max_drawdown(returns).abs();
    if dd == 0.0 {
        return Ok(0.0);
    }
    Ok(annual / dd)
}

/// Annualized sample standard deviation.
pub fn volatility(returns: &[f64]) -> f64 {
    sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Share of non-zero periods that were gains.
pub fn win_rate(returns: &[f64]) -> f64 {
    let mut wins = 0usize;
    let mut nonzero = 0usize;
    for &r in returns {
        if r != 0.0 {
            nonzero += 1;
            if r > 0.0 {
                wins += 1;
            }
        }
    }
    if nonzero == 0 {
        return 0.0;
    }
    wins as f64 / nonzero as f64
}

/// Gross gains over gross losses; 0.0 with no gains, +infinity with no losses.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit = returns.iter().filter(|&&r| r > 0.0).fold(0.0, |acc, r| acc + r);
    let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).sum::<f64>().abs();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
    }
    if gross_profit == 0.0 {
        return 0.0;
    }
    gross_profit / gross_loss
}

/// Annualized active return over annualized tracking error.
pub fn information_ratio(returns: &[f64], benchmark: &[f64]) -> Result<f64, MetricsError> {
    check_benchmark(returns, benchmark)?;
    let active: Vec<f64> = returns.iter().zip(benchmark).map(|(r, b)| r - b).collect();
    let tracking_error = sample_std(&active) * TRADING_DAYS_PER_YEAR.sqrt();
    if tracking_error <= STD_EPSILON {
        return Ok(0.0);
    }
    Ok(mean(&active) * TRADING_DAYS_PER_YEAR / tracking_error)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlphaBeta {
    pub alpha: f64,
    pub beta: f64,
}

/// Jensen's alpha (annualized) and beta against a benchmark.
pub fn alpha_beta(
    returns: &[f64],
    benchmark: &[f64],
    risk_free_rate: f64,
) -> Result<AlphaBeta, MetricsError> {
    check_benchmark(returns, benchmark)?;
    let er = excess(returns, risk_free_rate);
    let eb = excess(benchmark, risk_free_rate);

    let variance = sample_covariance(&eb, &eb);
    let beta = if variance <= STD_EPSILON * STD_EPSILON {
        0.0
    } else {
        sample_covariance(&er, &eb) / variance
    };
    let alpha = (mean(&er) - beta * mean(&eb)) * TRADING_DAYS_PER_YEAR;

    Ok(AlphaBeta { alpha, beta })
}

/// Fixed-schema metrics computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub total_return: f64,
    pub annual_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_ratio: Option<f64>,
}

impl MetricsReport {
    /// Flat name → value view; benchmark-relative keys only when present.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        let mut map = BTreeMap::new();
        map.insert("total_return", self.total_return);
        map.insert("annual_return", self.annual_return);
        map.insert("volatility", self.volatility);
        map.insert("sharpe_ratio", self.sharpe_ratio);
        map.insert("sortino_ratio", self.sortino_ratio);
        map.insert("calmar_ratio", self.calmar_ratio);
        map.insert("max_drawdown", self.max_drawdown);
        map.insert("win_rate", self.win_rate);
        map.insert("profit_factor", self.profit_factor);
        if let Some(v) = self.alpha {
            map.insert("alpha", v);
        }
        if let Some(v) = self.beta {
            map.insert("beta", v);
        }
        if let Some(v) = self.information_ratio {
            map.insert("information_ratio", v);
        }
        map
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Return:     {:.2}%", self.total_return * 100.0)?;
        writeln!(f, "Annual Return:    {:.2}%", self.annual_return * 100.0)?;
        writeln!(f, "Volatility:       {:.2}%", self.volatility * 100.0)?;
        writeln!(f, "Sharpe Ratio:     {:.3}", self.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio:    {:.3}", self.sortino_ratio)?;
        writeln!(f, "Calmar Ratio:     {:.3}", self.calmar_ratio)?;
        writeln!(f, "Max Drawdown:     {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "Win Rate:         {:.2}%", self.win_rate * 100.0)?;
        write!(f, "Profit Factor:    {:.2}", self.profit_factor)?;
        if let (Some(alpha), Some(beta)) = (self.alpha, self.beta) {
            write!(f, "\nAlpha:            {:.2}%", alpha * 100.0)?;
            write!(f, "\nBeta:             {:.2}", beta)?;
        }
        if let Some(ir) = self.information_ratio {
            write!(f, "\nInformation Ratio: {:.3}", ir)?;
        }
        Ok(())
    }
}

/// Full report at the default 2% risk-free rate.
pub fn summary(returns: &[f64], benchmark: Option<&[f64]>) -> Result<MetricsReport, MetricsError> {
    summary_with_rate(returns, benchmark, DEFAULT_RISK_FREE_RATE)
}

pub fn summary_with_rate(
    returns: &[f64],
    benchmark: Option<&[f64]>,
    risk_free_rate: f64,
) -> Result<MetricsReport, MetricsError> {
    let annual_return = annual_return(returns)?;

    let (alpha, beta, information_ratio) = match benchmark {
        Some(b) => {
            let ab = alpha_beta(returns, b, risk_free_rate)?;
            let ir = information_ratio(returns, b)?;
            (Some(ab.alpha), Some(ab.beta), Some(ir))
        }
        None => (None, None, None),
    };

    Ok(MetricsReport {
        total_return: total_return(returns),
        annual_return,
        volatility: volatility(returns),
        sharpe_ratio: sharpe_ratio(returns, risk_free_rate),
        sortino_ratio: sortino_ratio(returns, risk_free_rate),
        calmar_ratio: calmar_ratio(returns)?,
        max_drawdown: max_drawdown(returns),
        win_rate: win_rate(returns),
        profit_factor: profit_factor(returns),
        alpha,
        beta,
        information_ratio,
    })
}
