//! Multi-asset portfolio simulator: ranked top-N long allocation driven by
//! per-symbol model forecasts.
//!
//! The first asset's dates form the time axis. At each step every symbol
//! produces a [`SymbolStep`]; skips are counted and never abort the run.
//! Held symbols that fall out of the buy set are sold at the step close,
//! then the remaining cash is split across the buy set.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::domain::asset_data::AssetData;
use crate::domain::error::MarketLensError;
use crate::domain::features::PredictionHorizon;
use crate::domain::metrics::{DEFAULT_RISK_FREE_RATE, MetricsReport, summary_with_rate};
use crate::domain::model::{ModelKey, ModelKind, ModelRegistry};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{EquityPoint, Portfolio, equity_returns};
use crate::domain::returns::{ReturnSeries, align};
use crate::domain::trade::Trade;

/// Recorded with the run; every step is evaluated regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for RebalanceFrequency {
    type Err = MarketLensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RebalanceFrequency::Daily),
            "weekly" => Ok(RebalanceFrequency::Weekly),
            "monthly" => Ok(RebalanceFrequency::Monthly),
            other => Err(MarketLensError::UnknownRebalanceFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceFrequency::Daily => write!(f, "daily"),
            RebalanceFrequency::Weekly => write!(f, "weekly"),
            RebalanceFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    pub transaction_cost: f64,
    pub warm_up_periods: usize,
    pub min_feature_rows: usize,
    pub top_n: usize,
    pub buy_threshold: f64,
    pub invest_fraction: f64,
    pub trade_log_cap: usize,
    pub rebalance_frequency: RebalanceFrequency,
    pub benchmark_symbol: String,
    pub model_kind: ModelKind,
    pub horizon: PredictionHorizon,
    pub risk_free_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            initial_capital: 100_000.0,
            transaction_cost: 0.001,
            warm_up_periods: 100,
            min_feature_rows: 20,
            top_n: 2,
            buy_threshold: 0.01,
            invest_fraction: 0.95,
            trade_log_cap: 100,
            rebalance_frequency: RebalanceFrequency::Daily,
            benchmark_symbol: "SPY".to_string(),
            model_kind: ModelKind::Linear,
            horizon: PredictionHorizon::OneDay,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingBar,
    InsufficientHistory { rows: usize },
    NoModel,
    NoUsableFeatures,
    PredictionFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingBar => write!(f, "no bar on this date"),
            SkipReason::InsufficientHistory { rows } => {
                write!(f, "only {rows} valid feature rows")
            }
            SkipReason::NoModel => write!(f, "no registered model"),
            SkipReason::NoUsableFeatures => write!(f, "no usable features"),
            SkipReason::PredictionFailed(reason) => write!(f, "prediction failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolStep {
    Predicted(f64),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioResult {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub total_trades: usize,
    pub skip_counts: BTreeMap<String, usize>,
    pub benchmark_symbol: String,
    pub rebalance_frequency: RebalanceFrequency,
    pub final_cash: f64,
    /// Holdings still open after the last step.
    pub open_positions: usize,
    pub metrics: MetricsReport,
}

impl PortfolioResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map_or(0.0, |p| p.equity)
    }
}

/// Forecast for one symbol at `date` using only data up to that date.
pub fn predict_symbol(
    asset: &AssetData,
    date: NaiveDate,
    registry: &ModelRegistry,
    config: &SimulatorConfig,
) -> SymbolStep {
    let Some(index) = asset.get_bar_index(date) else {
        return SymbolStep::Skipped(SkipReason::MissingBar);
    };
    let rows = asset.features.valid_rows_through(index);
    if rows < config.min_feature_rows {
        return SymbolStep::Skipped(SkipReason::InsufficientHistory { rows });
    }
    let key = ModelKey::new(&asset.symbol, config.model_kind, config.horizon);
    let Some(entry) = registry.get(&key) else {
        return SymbolStep::Skipped(SkipReason::NoModel);
    };
    let Some(row) = asset.features.row(index) else {
        return SymbolStep::Skipped(SkipReason::NoUsableFeatures);
    };

    let selected = entry.project(row);
    if selected.is_empty() {
        return SymbolStep::Skipped(SkipReason::NoUsableFeatures);
    }

    match entry.model.predict(&selected) {
        Ok(p) if p.is_finite() => SymbolStep::Predicted(p),
        Ok(p) => SymbolStep::Skipped(SkipReason::PredictionFailed(format!("non-finite {p}"))),
        Err(e) => SymbolStep::Skipped(SkipReason::PredictionFailed(e.to_string())),
    }
}

/// Stable descending rank; the first `top_n` above `threshold` are bought.
pub fn select_buys<'a>(predictions: &[(&'a str, f64)], top_n: usize, threshold: f64) -> Vec<&'a str> {
    let mut ranked = predictions.to_vec();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .filter(|(_, p)| *p > threshold)
        .take(top_n)
        .map(|(s, _)| s)
        .collect()
}

fn benchmark_returns(asset: &AssetData, curve: &[EquityPoint]) -> Result<ReturnSeries, MarketLensError> {
    let bars: Vec<OhlcvBar> = curve
        .iter()
        .filter_map(|p| asset.get_bar(p.date).cloned())
        .collect();
    ReturnSeries::from_bars(&bars)
}

pub fn run_portfolio(
    assets: &[AssetData],
    registry: &ModelRegistry,
    config: &SimulatorConfig,
) -> Result<PortfolioResult, MarketLensError> {
    let base = assets
        .first()
        .ok_or_else(|| MarketLensError::BaseAssetMissing("no assets supplied".into()))?;
    let axis = base.dates();
    let start = config.warm_up_periods.max(1);
    if axis.len() <= start {
        return Err(MarketLensError::InsufficientData {
            symbol: base.symbol.clone(),
            bars: axis.len(),
            minimum: start + 1,
        });
    }

    info!(
        symbols = assets.len(),
        steps = axis.len() - start,
        model = %config.model_kind,
        "running portfolio simulation"
    );

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut skip_counts: BTreeMap<String, usize> =
        assets.iter().map(|a| (a.symbol.clone(), 0)).collect();
    portfolio.record_equity(axis[start - 1], config.initial_capital);

    for &date in &axis[start..] {
        let mut predicted: Vec<(&str, f64)> = Vec::new();
        for asset in assets {
            match predict_symbol(asset, date, registry, config) {
                SymbolStep::Predicted(p) => predicted.push((asset.symbol.as_str(), p)),
                SymbolStep::Skipped(reason) => {
                    *skip_counts.entry(asset.symbol.clone()).or_default() += 1;
                    debug!(symbol = %asset.symbol, %date, %reason, "skipped");
                }
            }
        }

        if !predicted.is_empty() {
            let buys = select_buys(&predicted, config.top_n, config.buy_threshold);

            for asset in assets {
                let symbol = asset.symbol.as_str();
                if !portfolio.is_held(symbol) || buys.contains(&symbol) {
                    continue;
                }
                match asset.close_on(date) {
                    Some(price) => {
                        portfolio.liquidate(symbol, price, date, config.transaction_cost);
                    }
                    None => debug!(symbol, %date, "no price to sell at; holding"),
                }
            }

            if !buys.is_empty() {
                let allocation = portfolio.cash * config.invest_fraction / buys.len() as f64;
                for symbol in &buys {
                    let price = assets
                        .iter()
                        .find(|a| a.symbol == *symbol)
                        .and_then(|a| a.close_on(date));
                    let Some(price) = price else { continue };
                    if portfolio
                        .buy(symbol, allocation, price, date, config.transaction_cost)
                        .is_none()
                    {
                        debug!(symbol, %date, allocation, "insufficient cash; buy skipped");
                    }
                }
            }
        }

        let prices: HashMap<String, f64> = assets
            .iter()
            .filter_map(|a| a.close_on(date).map(|p| (a.symbol.clone(), p)))
            .collect();
        let equity = portfolio.mark_to_market(&prices);
        portfolio.record_equity(date, equity);
    }

    let benchmark = assets
        .iter()
        .find(|a| a.symbol == config.benchmark_symbol)
        .unwrap_or(base);

    let strategy = ReturnSeries::from_pairs(equity_returns(&portfolio.equity_curve));
    let bench = benchmark_returns(benchmark, &portfolio.equity_curve)?;
    let (common, strategy_values, bench_values) = align(&strategy, &bench);
    let metrics = if common.is_empty() {
        warn!(benchmark = %benchmark.symbol, "benchmark shares no dates; reporting absolute metrics");
        summary_with_rate(&strategy.values(), None, config.risk_free_rate)?
    } else {
        summary_with_rate(&strategy_values, Some(&bench_values), config.risk_free_rate)?
    };

    let total_trades = portfolio.trades.len();
    let open_positions = portfolio.holding_count();
    let mut trades = portfolio.trades;
    trades.truncate(config.trade_log_cap);

    let result = PortfolioResult {
        equity_curve: portfolio.equity_curve,
        trades,
        total_trades,
        skip_counts,
        benchmark_symbol: benchmark.symbol.clone(),
        rebalance_frequency: config.rebalance_frequency,
        final_cash: portfolio.cash,
        open_positions,
        metrics,
    };
    info!(
        total_trades,
        final_equity = result.final_equity(),
        "portfolio simulation complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::FEATURE_NAMES;
    use crate::domain::model::{Model, ModelError};
    use crate::domain::trade::TradeAction;
    use std::cell::Cell;

    /// Returns a scripted forecast per call, repeating the last entry.
    #[derive(Debug)]
    struct Scripted {
        script: Vec<f64>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn boxed(script: &[f64]) -> Box<dyn Model> {
            Box::new(Scripted {
                script: script.to_vec(),
                calls: Cell::new(0),
            })
        }
    }

    impl Model for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), ModelError> {
            Ok(())
        }

        fn predict(&self, _: &[f64]) -> Result<f64, ModelError> {
            let i = self.calls.get();
            self.calls.set(i + 1);
            Ok(self.script[i.min(self.script.len() - 1)])
        }
    }

    fn asset(symbol: &str, n: usize, drift: f64) -> AssetData {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 50.0 * (1.0 + drift).powi(i as i32) + (i as f64 * 0.9).sin();
                OhlcvBar {
                    symbol: symbol.into(),
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 10_000.0,
                }
            })
            .collect();
        AssetData::new(symbol.into(), bars)
    }

    fn config(warm_up: usize) -> SimulatorConfig {
        SimulatorConfig {
            warm_up_periods: warm_up,
            min_feature_rows: 1,
            benchmark_symbol: "A".into(),
            ..SimulatorConfig::default()
        }
    }

    fn register(registry: &mut ModelRegistry, symbol: &str, model: Box<dyn Model>) {
        let names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        registry.register(
            ModelKey::new(symbol, ModelKind::Linear, PredictionHorizon::OneDay),
            model,
            names,
        );
    }

    #[test]
    fn rotation_sells_loser_and_buys_leader() {
        let assets = vec![asset("A", 62, 0.001), asset("B", 62, 0.002)];
        let mut reg = ModelRegistry::new();
        register(&mut reg, "A", Scripted::boxed(&[0.0, 0.05]));
        register(&mut reg, "B", Scripted::boxed(&[0.05, -0.01]));

        let result = run_portfolio(&assets, &reg, &config(60)).unwrap();

        let day2 = assets[0].ohlcv[61].date;
        let step: Vec<&Trade> = result.trades.iter().filter(|t| t.date == day2).collect();
        assert_eq!(step.len(), 2);
        assert_eq!(step[0].symbol, "B");
        assert_eq!(step[0].action, TradeAction::Sell);
        assert_eq!(step[1].symbol, "A");
        assert_eq!(step[1].action, TradeAction::Buy);
        assert_eq!(result.total_trades, 3);
        assert_eq!(result.equity_curve.len(), 3);
        assert_eq!(result.equity_curve[0].date, assets[0].ohlcv[59].date);
    }

    #[test]
    fn below_threshold_keeps_cash() {
        let assets = vec![asset("A", 65, 0.0)];
        let mut reg = ModelRegistry::new();
        register(&mut reg, "A", Scripted::boxed(&[0.005]));

        let result = run_portfolio(&assets, &reg, &config(60)).unwrap();
        assert_eq!(result.total_trades, 0);
        assert!(result.equity_curve.iter().all(|p| p.equity == 100_000.0));
        assert_eq!(result.final_cash, 100_000.0);
        assert_eq!(result.open_positions, 0);
    }

    #[test]
    fn buy_spends_invest_fraction_with_cost() {
        let assets = vec![asset("A", 61, 0.0)];
        let mut reg = ModelRegistry::new();
        register(&mut reg, "A", Scripted::boxed(&[0.02]));

        let result = run_portfolio(&assets, &reg, &config(60)).unwrap();
        let buy = &result.trades[0];
        assert!((buy.value - 95_000.0).abs() < 1e-6);
        assert!((result.final_cash - (100_000.0 - 95_000.0 * 1.001)).abs() < 1e-6);
        assert_eq!(result.open_positions, 1);
        // marked at the same close it was bought at
        assert!((result.final_equity() - (5_000.0 - 95.0 + 95_000.0)).abs() < 1e-6);
    }

    #[test]
    fn skips_are_counted_per_symbol() {
        let assets = vec![asset("A", 63, 0.0), asset("B", 63, 0.0)];
        let mut reg = ModelRegistry::new();
        register(&mut reg, "A", Scripted::boxed(&[0.0]));

        let result = run_portfolio(&assets, &reg, &config(60)).unwrap();
        assert_eq!(result.skip_counts["A"], 0);
        assert_eq!(result.skip_counts["B"], 3);
    }

    #[test]
    fn predict_symbol_reasons() {
        let a = asset("A", 60, 0.0);
        let reg = ModelRegistry::new();
        let cfg = SimulatorConfig {
            min_feature_rows: 5,
            ..SimulatorConfig::default()
        };

        let missing = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        assert_eq!(
            predict_symbol(&a, missing, &reg, &cfg),
            SymbolStep::Skipped(SkipReason::MissingBar)
        );
        // rows 49..=51 are valid
        assert_eq!(
            predict_symbol(&a, a.ohlcv[51].date, &reg, &cfg),
            SymbolStep::Skipped(SkipReason::InsufficientHistory { rows: 3 })
        );
        assert_eq!(
            predict_symbol(&a, a.ohlcv[59].date, &reg, &cfg),
            SymbolStep::Skipped(SkipReason::NoModel)
        );
    }

    #[test]
    fn unfitted_model_is_prediction_failure() {
        let a = asset("A", 60, 0.0);
        let mut reg = ModelRegistry::new();
        register(&mut reg, "A", ModelKind::Linear.build(1.0));
        let step = predict_symbol(&a, a.ohlcv[59].date, &reg, &config(10));
        assert!(matches!(step, SymbolStep::Skipped(SkipReason::PredictionFailed(_))));
    }

    #[test]
    fn select_buys_is_stable_and_capped() {
        let preds = [("A", 0.02), ("B", 0.05), ("C", 0.02), ("D", 0.0)];
        assert_eq!(select_buys(&preds, 2, 0.01), vec!["B", "A"]);
        assert_eq!(select_buys(&preds, 5, 0.01), vec!["B", "A", "C"]);
        assert!(select_buys(&preds, 2, 0.1).is_empty());
    }

    #[test]
    fn no_assets_or_short_axis() {
        let reg = ModelRegistry::new();
        assert!(matches!(
            run_portfolio(&[], &reg, &config(10)),
            Err(MarketLensError::BaseAssetMissing(_))
        ));
        assert!(matches!(
            run_portfolio(&[asset("A", 10, 0.0)], &reg, &config(10)),
            Err(MarketLensError::InsufficientData { bars: 10, minimum: 11, .. })
        ));
    }

    #[test]
    fn rebalance_frequency_parse() {
        assert_eq!(
            "Weekly".parse::<RebalanceFrequency>().unwrap(),
            RebalanceFrequency::Weekly
        );
        assert!(matches!(
            "hourly".parse::<RebalanceFrequency>(),
            Err(MarketLensError::UnknownRebalanceFrequency(_))
        ));
    }
}
