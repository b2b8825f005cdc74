//! Configuration validation.
//!
//! Checks every section that is present before any data is loaded. Only
//! `[data]` is mandatory; the other sections fall back to defaults.

use crate::domain::backtest::BacktestMode;
use crate::domain::cost::CostMethod;
use crate::domain::error::MarketLensError;
use crate::domain::features::PredictionHorizon;
use crate::domain::model::ModelKind;
use crate::domain::simulator::RebalanceFrequency;
use crate::domain::sizing::NormalizationMethod;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> MarketLensError {
    MarketLensError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    validate_data(config)?;
    validate_backtest(config)?;
    validate_walk_forward(config)?;
    validate_model(config)?;
    validate_portfolio(config)?;
    Ok(())
}

pub fn parse_date(value: Option<&str>, section: &str, field: &str) -> Result<NaiveDate, MarketLensError> {
    match value {
        None => Err(MarketLensError::ConfigMissing {
            section: section.to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
            invalid(section, field, format!("invalid {field} format, expected YYYY-MM-DD"))
        }),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    if config.get_string("data", "dir").is_none() {
        return Err(MarketLensError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        });
    }
    let start = parse_date(config.get_string("data", "start_date").as_deref(), "data", "start_date")?;
    let end = parse_date(config.get_string("data", "end_date").as_deref(), "data", "end_date")?;
    if start >= end {
        return Err(invalid("data", "start_date", "start_date must be before end_date"));
    }
    Ok(())
}

fn validate_parsed<T: FromStr<Err = MarketLensError>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), MarketLensError> {
    match config.get_string(section, key) {
        Some(value) => value.parse::<T>().map(|_| ()),
        None => Ok(()),
    }
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    let capital = config.get_double("backtest", "initial_capital", 100_000.0);
    if capital <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    for key in ["transaction_cost", "slippage"] {
        if config.get_double("backtest", key, 0.0) < 0.0 {
            return Err(invalid("backtest", key, format!("{key} must be non-negative")));
        }
    }
    let rate = config.get_double("backtest", "risk_free_rate", 0.02);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    let fraction = config.get_double("backtest", "train_fraction", 0.7);
    if fraction <= 0.0 || fraction >= 1.0 {
        return Err(invalid("backtest", "train_fraction", "train_fraction must be in (0, 1)"));
    }
    validate_parsed::<CostMethod>(config, "backtest", "cost_method")?;
    validate_parsed::<NormalizationMethod>(config, "backtest", "normalization")?;
    validate_parsed::<BacktestMode>(config, "backtest", "mode")?;
    Ok(())
}

fn validate_walk_forward(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    for (key, default) in [("train_size", 1), ("step_size", 20), ("retrain_frequency", 60)] {
        if config.get_int("walk_forward", key, default) < 1 {
            return Err(invalid("walk_forward", key, format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

fn validate_model(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    validate_parsed::<ModelKind>(config, "model", "type")?;
    validate_parsed::<PredictionHorizon>(config, "model", "horizon")?;
    if config.get_double("model", "ridge_alpha", 1.0) < 0.0 {
        return Err(invalid("model", "ridge_alpha", "ridge_alpha must be non-negative"));
    }
    if let Some(train_end) = config.get_string("model", "train_end") {
        parse_date(Some(&train_end), "model", "train_end")?;
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), MarketLensError> {
    if let Some(symbols) = config.get_string("portfolio", "symbols") {
        parse_symbols(&symbols).map_err(|e| invalid("portfolio", "symbols", e.to_string()))?;
    }
    let fraction = config.get_double("portfolio", "invest_fraction", 0.95);
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid("portfolio", "invest_fraction", "invest_fraction must be in (0, 1]"));
    }
    for (key, default, minimum) in [
        ("top_n", 2, 1),
        ("warm_up_periods", 100, 0),
        ("min_feature_rows", 20, 1),
        ("trade_log_cap", 100, 0),
    ] {
        if config.get_int("portfolio", key, default) < minimum {
            return Err(invalid("portfolio", key, format!("{key} must be at least {minimum}")));
        }
    }
    validate_parsed::<RebalanceFrequency>(config, "portfolio", "rebalance_frequency")?;
    Ok(())
}
