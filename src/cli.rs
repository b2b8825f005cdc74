//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::analysis::{AnalysisOptions, AnalysisReport, analyze_assets};
use crate::domain::asset_data::AssetData;
use crate::domain::backtest::{BacktestConfig, BacktestMode, BacktestResult, run_backtest};
use crate::domain::config_validation::{parse_date, validate_config};
use crate::domain::cost::{CostMethod, CostModel};
use crate::domain::error::MarketLensError;
use crate::domain::features::{LabeledDataset, PredictionHorizon};
use crate::domain::metrics::{DEFAULT_RISK_FREE_RATE, summary_with_rate};
use crate::domain::model::{ModelKey, ModelKind, ModelRegistry, rank_feature_importance};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::prediction::{Prediction, predict_latest};
use crate::domain::returns::ReturnSeries;
use crate::domain::simulator::{PortfolioResult, RebalanceFrequency, SimulatorConfig, run_portfolio};
use crate::domain::sizing::NormalizationMethod;
use crate::domain::universe::{load_universe, parse_symbols};
use crate::domain::walk_forward::{WalkForwardConfig, run_walk_forward};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "marketlens", about = "Quantitative backtesting and market analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a single symbol with model predictions
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// static or walk-forward
        #[arg(long)]
        mode: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate a multi-asset top-N rotation portfolio
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Performance statistics of a symbol's daily returns
    Stats {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forecast each symbol from its latest bar and map it to a signal
    Predict {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols; defaults to [portfolio] symbols, then [backtest] symbol
        #[arg(long)]
        symbols: Option<String>,
        /// Number of ranked feature importances to report per symbol
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Price statistics, return moments, indicators and cross-asset correlation
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols; defaults to [portfolio] symbols, then [backtest] symbol
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the data range of one or all symbols
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            mode,
            output,
        } => run_backtest_command(&config, symbol.as_deref(), mode.as_deref(), output.as_deref()),
        Command::Portfolio { config, output } => run_portfolio_command(&config, output.as_deref()),
        Command::Stats {
            config,
            symbol,
            output,
        } => run_stats(&config, symbol.as_deref(), output.as_deref()),
        Command::Predict {
            config,
            symbols,
            top,
            output,
        } => run_predict_command(&config, symbols.as_deref(), top, output.as_deref()),
        Command::Analyze {
            config,
            symbols,
            output,
        } => run_analyze_command(&config, symbols.as_deref(), output.as_deref()),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, MarketLensError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

fn parse_or_default<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, MarketLensError>
where
    T: std::str::FromStr<Err = MarketLensError> + Default,
{
    config
        .get_string(section, key)
        .map_or_else(|| Ok(T::default()), |v| v.parse())
}

fn non_negative_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(0) as usize
}

pub fn data_range(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), MarketLensError> {
    let start = parse_date(config.get_string("data", "start_date").as_deref(), "data", "start_date")?;
    let end = parse_date(config.get_string("data", "end_date").as_deref(), "data", "end_date")?;
    Ok((start, end))
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<CsvAdapter, MarketLensError> {
    let dir = config
        .get_string("data", "dir")
        .ok_or_else(|| MarketLensError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(dir)))
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MarketLensError> {
    let method: CostMethod = parse_or_default(config, "backtest", "cost_method")?;
    let normalization: NormalizationMethod = parse_or_default(config, "backtest", "normalization")?;
    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        cost: CostModel {
            method,
            cost_rate: config.get_double("backtest", "transaction_cost", 0.001),
            slippage_rate: config.get_double("backtest", "slippage", 0.0005),
        },
        risk_free_rate: config.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
        normalization,
    })
}

/// `train_size` defaults to `train_fraction` of the dataset rows.
pub fn build_walk_forward_config(config: &dyn ConfigPort, rows: usize) -> WalkForwardConfig {
    let fraction = config.get_double("backtest", "train_fraction", 0.7);
    let defaults = WalkForwardConfig::from_fraction(rows, fraction);
    WalkForwardConfig {
        train_size: non_negative_usize(config, "walk_forward", "train_size", defaults.train_size),
        step_size: non_negative_usize(config, "walk_forward", "step_size", defaults.step_size),
        retrain_frequency: non_negative_usize(
            config,
            "walk_forward",
            "retrain_frequency",
            defaults.retrain_frequency,
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub kind: ModelKind,
    pub horizon: PredictionHorizon,
    pub ridge_alpha: f64,
    pub train_end: Option<NaiveDate>,
}

impl ModelSettings {
    /// Without `train_end` portfolio models are fitted on the range they trade.
    pub fn trains_in_sample(&self) -> bool {
        self.train_end.is_none()
    }
}

pub fn build_model_settings(config: &dyn ConfigPort) -> Result<ModelSettings, MarketLensError> {
    let train_end = match config.get_string("model", "train_end") {
        Some(value) => Some(parse_date(Some(&value), "model", "train_end")?),
        None => None,
    };
    Ok(ModelSettings {
        kind: parse_or_default(config, "model", "type")?,
        horizon: parse_or_default(config, "model", "horizon")?,
        ridge_alpha: config.get_double("model", "ridge_alpha", 1.0),
        train_end,
    })
}

pub fn build_simulator_config(config: &dyn ConfigPort) -> Result<SimulatorConfig, MarketLensError> {
    let model = build_model_settings(config)?;
    let rebalance_frequency: RebalanceFrequency =
        parse_or_default(config, "portfolio", "rebalance_frequency")?;
    let defaults = SimulatorConfig::default();
    Ok(SimulatorConfig {
        initial_capital: config.get_double("backtest", "initial_capital", defaults.initial_capital),
        transaction_cost: config.get_double("backtest", "transaction_cost", defaults.transaction_cost),
        warm_up_periods: non_negative_usize(
            config,
            "portfolio",
            "warm_up_periods",
            defaults.warm_up_periods,
        ),
        min_feature_rows: non_negative_usize(
            config,
            "portfolio",
            "min_feature_rows",
            defaults.min_feature_rows,
        ),
        top_n: non_negative_usize(config, "portfolio", "top_n", defaults.top_n),
        buy_threshold: config.get_double("portfolio", "buy_threshold", defaults.buy_threshold),
        invest_fraction: config.get_double("portfolio", "invest_fraction", defaults.invest_fraction),
        trade_log_cap: non_negative_usize(config, "portfolio", "trade_log_cap", defaults.trade_log_cap),
        rebalance_frequency,
        benchmark_symbol: config
            .get_string("portfolio", "benchmark")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.benchmark_symbol),
        model_kind: model.kind,
        horizon: model.horizon,
        risk_free_rate: config.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
    })
}

/// Symbol from the command line, else `[backtest] symbol`.
pub fn resolve_symbol(symbol_override: Option<&str>, config: &dyn ConfigPort) -> Result<String, MarketLensError> {
    symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "symbol"))
        .map(|s| s.trim().to_uppercase())
        .ok_or_else(|| MarketLensError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })
}

/// Symbols from the command line, else `[portfolio] symbols`, else `[backtest] symbol`.
pub fn resolve_symbols(symbols_override: Option<&str>, config: &dyn ConfigPort) -> Result<Vec<String>, MarketLensError> {
    let (raw, section, key) = match symbols_override {
        Some(list) => (list.to_string(), "cli", "symbols"),
        None => match config.get_string("portfolio", "symbols") {
            Some(list) => (list, "portfolio", "symbols"),
            None => return resolve_symbol(None, config).map(|s| vec![s]),
        },
    };
    parse_symbols(&raw).map_err(|e| MarketLensError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

pub fn build_analysis_options(config: &dyn ConfigPort) -> AnalysisOptions {
    let defaults = AnalysisOptions::default();
    AnalysisOptions {
        correlations: config.get_bool("analysis", "correlations", defaults.correlations),
        indicators: config.get_bool("analysis", "indicators", defaults.indicators),
    }
}

fn fetch_bars(
    data_port: &dyn DataPort,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<OhlcvBar>, MarketLensError> {
    let bars = data_port.fetch_ohlcv(symbol, start, end)?;
    if bars.is_empty() {
        return Err(MarketLensError::NoData {
            symbol: symbol.to_string(),
        });
    }
    info!(symbol, bars = bars.len(), "loaded");
    Ok(bars)
}

/// Benchmark returns for `[backtest] benchmark`; a benchmark that cannot be
/// loaded is dropped with a warning.
fn load_benchmark(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<ReturnSeries> {
    let symbol = config.get_string("backtest", "benchmark")?.to_uppercase();
    match fetch_bars(data_port, &symbol, start, end).and_then(|bars| ReturnSeries::from_bars(&bars)) {
        Ok(series) => Some(series),
        Err(e) => {
            warn!(benchmark = %symbol, error = %e, "benchmark unavailable; reporting absolute metrics");
            None
        }
    }
}

/// Fit once on the leading `train_fraction` of `dataset`, predict the rest.
pub fn run_static(
    dataset: &LabeledDataset,
    settings: &ModelSettings,
    train_fraction: f64,
    config: &BacktestConfig,
    benchmark: Option<&ReturnSeries>,
) -> Result<BacktestResult, MarketLensError> {
    let n = dataset.len();
    let train_rows = ((n as f64) * train_fraction).floor() as usize;
    // only rows whose forward target is known by the split
    let fit_rows = (train_rows + 1).saturating_sub(dataset.horizon.periods()).min(n);

    let mut model = settings.kind.build(settings.ridge_alpha);
    model.fit(&dataset.features[..fit_rows], &dataset.targets[..fit_rows])?;

    let mut predictions = Vec::with_capacity(n.saturating_sub(train_rows));
    for row in &dataset.features[train_rows.min(n)..] {
        predictions.push(Some(model.predict(row)?));
    }
    let returns = ReturnSeries::from_pairs(
        dataset.dates[train_rows.min(n)..]
            .iter()
            .copied()
            .zip(dataset.realized[train_rows.min(n)..].iter().copied()),
    );

    if let Some(weights) = model.feature_importance() {
        for entry in rank_feature_importance(&dataset.feature_names, &weights).iter().take(5) {
            info!(rank = entry.rank, feature = %entry.feature, importance = entry.importance, "feature importance");
        }
    }

    run_backtest(&returns, &predictions, config, benchmark)
}

fn run_backtest_command(
    config_path: &Path,
    symbol_override: Option<&str>,
    mode_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), MarketLensError> {
    // Stage 1: Load config
    let config = load_config(config_path)?;
    let symbol = resolve_symbol(symbol_override, &config)?;
    let mode: BacktestMode = match mode_override {
        Some(m) => m.parse()?,
        None => parse_or_default(&config, "backtest", "mode")?,
    };
    let bt_config = build_backtest_config(&config)?;
    let settings = build_model_settings(&config)?;
    let (start, end) = data_range(&config)?;

    // Stage 2: Load prices and build the labelled dataset
    let data_port = build_data_port(&config)?;
    let bars = fetch_bars(&data_port, &symbol, start, end)?;
    let dataset = LabeledDataset::from_bars(&bars, settings.horizon);
    if dataset.len() < 3 {
        return Err(MarketLensError::InsufficientData {
            symbol,
            bars: bars.len(),
            minimum: bars.len() - dataset.len() + 3,
        });
    }
    let benchmark = load_benchmark(&data_port, &config, start, end);

    eprintln!(
        "Running {} backtest: {} ({} rows, {} to {}), model {} @ {}",
        match mode {
            BacktestMode::Static => "static",
            BacktestMode::WalkForward => "walk-forward",
        },
        symbol,
        dataset.len(),
        start,
        end,
        settings.kind,
        settings.horizon,
    );

    // Stage 3: Run
    let report = JsonReportAdapter::new();
    match mode {
        BacktestMode::Static => {
            let fraction = config.get_double("backtest", "train_fraction", 0.7);
            let result = run_static(&dataset, &settings, fraction, &bt_config, benchmark.as_ref())?;
            print_backtest_summary(&symbol, &result);
            if let Some(path) = output_path {
                report.write_backtest(&symbol, &result, path)?;
                eprintln!("\nReport written to: {}", path.display());
            }
        }
        BacktestMode::WalkForward => {
            let wf_config = build_walk_forward_config(&config, dataset.len());
            let mut model = settings.kind.build(settings.ridge_alpha);
            let result = run_walk_forward(
                &dataset,
                model.as_mut(),
                &wf_config,
                &bt_config,
                benchmark.as_ref(),
            )?;
            print_backtest_summary(&symbol, &result.backtest);
            eprintln!("Retrains:         {}", result.retrain_count);
            eprintln!(
                "Windows:          train {} / step {} / retrain every {}",
                wf_config.train_size, wf_config.step_size, wf_config.retrain_frequency
            );
            if let Some(path) = output_path {
                report.write_walk_forward(&symbol, &result, path)?;
                eprintln!("\nReport written to: {}", path.display());
            }
        }
    }
    Ok(())
}

fn print_backtest_summary(symbol: &str, result: &BacktestResult) {
    eprintln!("\n=== {symbol} Backtest Results ===");
    eprintln!("{}", result.metrics);
    eprintln!("Final Equity:     ${:.2}", result.final_equity());
    eprintln!("Total Cost:       {:.4}", result.total_cost());
}

/// Fit one model per asset on data up to `train_end` (or the full range).
pub fn train_registry(assets: &[AssetData], settings: &ModelSettings) -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    for asset in assets {
        let mut dataset = LabeledDataset::from_frame(&asset.ohlcv, &asset.features, settings.horizon);
        if let Some(end) = settings.train_end {
            dataset.truncate_after(end);
        }
        if dataset.is_empty() {
            warn!(symbol = %asset.symbol, "no training rows; symbol will not be predicted");
            continue;
        }

        let mut model = settings.kind.build(settings.ridge_alpha);
        match model.fit(&dataset.features, &dataset.targets) {
            Ok(()) => {
                info!(symbol = %asset.symbol, rows = dataset.len(), model = model.name(), "model trained");
                registry.register(
                    ModelKey::new(&asset.symbol, settings.kind, settings.horizon),
                    model,
                    dataset.feature_names.clone(),
                );
            }
            Err(e) => warn!(symbol = %asset.symbol, error = %e, "model training failed"),
        }
    }
    registry
}

fn run_portfolio_command(config_path: &Path, output_path: Option<&Path>) -> Result<(), MarketLensError> {
    // Stage 1: Load config
    let config = load_config(config_path)?;
    let symbols_raw = config
        .get_string("portfolio", "symbols")
        .ok_or_else(|| MarketLensError::ConfigMissing {
            section: "portfolio".into(),
            key: "symbols".into(),
        })?;
    let symbols = parse_symbols(&symbols_raw).map_err(|e| MarketLensError::ConfigInvalid {
        section: "portfolio".into(),
        key: "symbols".into(),
        reason: e.to_string(),
    })?;
    let sim_config = build_simulator_config(&config)?;
    let settings = build_model_settings(&config)?;
    let (start, end) = data_range(&config)?;

    // Stage 2: Load universe
    eprintln!("Loading {} symbols...", symbols.len());
    let data_port = build_data_port(&config)?;
    let universe = load_universe(&data_port, &symbols, start, end, sim_config.warm_up_periods + 1)?;
    for skipped in &universe.skipped {
        eprintln!("warning: skipping {} ({:?})", skipped.symbol, skipped.reason);
    }
    let assets: Vec<AssetData> = universe
        .histories
        .into_iter()
        .map(|(symbol, bars)| AssetData::new(symbol, bars))
        .collect();

    // Stage 3: Train models and simulate
    if settings.trains_in_sample() {
        warn!("[model] train_end is not set; portfolio results are in-sample");
    }
    let registry = train_registry(&assets, &settings);
    eprintln!(
        "Running portfolio: {} symbols, {} models, top {} ({} rebalance)",
        assets.len(),
        registry.len(),
        sim_config.top_n,
        sim_config.rebalance_frequency,
    );
    let result = run_portfolio(&assets, &registry, &sim_config)?;
    print_portfolio_summary(&result);

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_portfolio(&result, path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn print_portfolio_summary(result: &PortfolioResult) {
    eprintln!("\n=== Portfolio Results (benchmark {}) ===", result.benchmark_symbol);
    eprintln!("{}", result.metrics);
    eprintln!("Final Equity:     ${:.2}", result.final_equity());
    eprintln!("Final Cash:       ${:.2}", result.final_cash);
    eprintln!("Total Trades:     {}", result.total_trades);
    eprintln!("Open Positions:   {}", result.open_positions);

    let skipped: Vec<_> = result.skip_counts.iter().filter(|(_, n)| **n > 0).collect();
    if !skipped.is_empty() {
        eprintln!("\n=== Skipped Steps ===");
        for (symbol, count) in skipped {
            eprintln!("  {symbol}: {count}");
        }
    }
}

fn run_predict_command(
    config_path: &Path,
    symbols_override: Option<&str>,
    top_n: usize,
    output_path: Option<&Path>,
) -> Result<(), MarketLensError> {
    // Stage 1: Load config
    let config = load_config(config_path)?;
    let symbols = resolve_symbols(symbols_override, &config)?;
    let settings = build_model_settings(&config)?;
    let (start, end) = data_range(&config)?;

    // Stage 2: Load histories
    let data_port = build_data_port(&config)?;
    let universe = load_universe(&data_port, &symbols, start, end, 1)?;
    for skipped in &universe.skipped {
        eprintln!("warning: skipping {} ({:?})", skipped.symbol, skipped.reason);
    }
    let assets: Vec<AssetData> = universe
        .histories
        .into_iter()
        .map(|(symbol, bars)| AssetData::new(symbol, bars))
        .collect();

    // Stage 3: Train and forecast
    let registry = train_registry(&assets, &settings);
    let mut predictions = Vec::with_capacity(assets.len());
    let mut last_error = None;
    for asset in &assets {
        match predict_latest(asset, &registry, settings.kind, settings.horizon, top_n) {
            Ok(prediction) => {
                info!(symbol = %asset.symbol, bars = asset.bar_count(), signal = %prediction.signal, "predicted");
                predictions.push(prediction);
            }
            Err(e) => {
                warn!(symbol = %asset.symbol, error = %e, "prediction failed");
                last_error = Some(e);
            }
        }
    }
    if predictions.is_empty() {
        return Err(last_error.unwrap_or_else(|| MarketLensError::NoData {
            symbol: "all".to_string(),
        }));
    }
    print_predictions(&predictions, &settings);

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_predictions(&predictions, path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn print_predictions(predictions: &[Prediction], settings: &ModelSettings) {
    eprintln!("\n=== Predictions ({} @ {}) ===", settings.kind, settings.horizon);
    eprintln!(
        "{:<10} {:<12} {:>10} {:>6} {:>10} {:>12} {:>12}",
        "Symbol", "Date", "Forecast", "Signal", "Confidence", "Price", "Target"
    );
    for p in predictions {
        eprintln!(
            "{:<10} {:<12} {:>9.2}% {:>6} {:>10.2} {:>12.2} {:>12.2}",
            p.symbol,
            p.date.to_string(),
            p.predicted_return * 100.0,
            p.signal.to_string(),
            p.confidence,
            p.current_price,
            p.predicted_price
        );
    }
    if let Some(first) = predictions.first() {
        for f in &first.top_features {
            eprintln!("  {} #{} {:<16} {:+.4}", first.symbol, f.rank, f.feature, f.importance);
        }
    }
}

fn run_analyze_command(
    config_path: &Path,
    symbols_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), MarketLensError> {
    let config = load_config(config_path)?;
    let symbols = resolve_symbols(symbols_override, &config)?;
    let options = build_analysis_options(&config);
    let (start, end) = data_range(&config)?;

    let data_port = build_data_port(&config)?;
    let universe = load_universe(&data_port, &symbols, start, end, 2)?;
    for skipped in &universe.skipped {
        eprintln!("warning: skipping {} ({:?})", skipped.symbol, skipped.reason);
    }
    let report = analyze_assets(&universe.histories, &options)?;
    print_analysis(&report);

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_analysis(&report, path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn print_analysis(report: &AnalysisReport) {
    for asset in &report.assets {
        let (stats, returns) = (&asset.statistics, &asset.returns_summary);
        eprintln!("\n=== {} ===", asset.symbol);
        eprintln!("Data Points:      {}", stats.data_points);
        eprintln!("Current Price:    {:.2}", stats.current_price);
        eprintln!("Price Range:      {:.2} - {:.2} (mean {:.2})", stats.min_price, stats.max_price, stats.mean_price);
        eprintln!("Total Return:     {:.2}%", returns.total_return * 100.0);
        eprintln!("Volatility:       {:.2}%", returns.annual_volatility * 100.0);
        eprintln!("Skewness:         {:.3}", returns.skewness);
        eprintln!("Kurtosis:         {:.3}", returns.kurtosis);
        if let Some(rsi) = asset.indicators.as_ref().and_then(|i| i.rsi_14) {
            eprintln!("RSI(14):          {rsi:.1}");
        }
    }
    if let Some(matrix) = &report.correlation {
        eprintln!("\n=== Return Correlation ({} common dates) ===", matrix.observations);
        for (symbol, row) in matrix.symbols.iter().zip(&matrix.values) {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:>7.3}")).collect();
            eprintln!("{symbol:<10} {}", cells.join(" "));
        }
    }
}

fn run_stats(
    config_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), MarketLensError> {
    let config = load_config(config_path)?;
    let symbol = resolve_symbol(symbol_override, &config)?;
    let (start, end) = data_range(&config)?;
    let data_port = build_data_port(&config)?;

    let bars = fetch_bars(&data_port, &symbol, start, end)?;
    let returns = ReturnSeries::from_bars(&bars)?;
    let rate = config.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE);
    let metrics = summary_with_rate(&returns.values(), None, rate)?;

    eprintln!("\n=== {symbol} ===");
    eprintln!("Data Points:      {}", bars.len());
    eprintln!("{metrics}");

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_metrics(&symbol, &metrics, bars.len(), path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), MarketLensError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let data_port = build_data_port(&config)?;

    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => data_port.list_symbols()?,
    };
    if symbols.is_empty() {
        eprintln!("No symbols found.");
        return Ok(());
    }

    eprintln!("{:<12} {:<12} {:<12} {:>8}", "Symbol", "First", "Last", "Bars");
    for symbol in &symbols {
        match data_port.get_data_range(symbol)? {
            Some((first, last, count)) => {
                eprintln!(
                    "{:<12} {:<12} {:<12} {:>8}",
                    symbol,
                    first.to_string(),
                    last.to_string(),
                    count
                )
            }
            None => eprintln!("{symbol:<12} no data"),
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), MarketLensError> {
    let config = load_config(config_path)?;
    let (start, end) = data_range(&config)?;
    let settings = build_model_settings(&config)?;
    eprintln!("\nData:       {start} to {end}");
    eprintln!("Model:      {} @ {}", settings.kind, settings.horizon);
    if let Some(symbols) = config.get_string("portfolio", "symbols") {
        eprintln!("Portfolio:  {symbols}");
    }
    let optional: Vec<&str> = ["backtest", "walk_forward", "model", "portfolio", "analysis"]
        .into_iter()
        .filter(|section| config.has_section(section))
        .collect();
    if !optional.is_empty() {
        eprintln!("Sections:   {}", optional.join(", "));
    }
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
