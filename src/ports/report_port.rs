//! Result report port.

use std::path::Path;

use crate::domain::analysis::AnalysisReport;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::MarketLensError;
use crate::domain::metrics::MetricsReport;
use crate::domain::prediction::Prediction;
use crate::domain::simulator::PortfolioResult;
use crate::domain::walk_forward::WalkForwardResult;

/// Port for persisting run artefacts.
pub trait ReportPort {
    fn write_backtest(
        &self,
        symbol: &str,
        result: &BacktestResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError>;

    fn write_walk_forward(
        &self,
        symbol: &str,
        result: &WalkForwardResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError>;

    fn write_portfolio(
        &self,
        result: &PortfolioResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError>;

    /// `data_points` is the number of price bars the metrics were derived from.
    fn write_metrics(
        &self,
        symbol: &str,
        metrics: &MetricsReport,
        data_points: usize,
        output_path: &Path,
    ) -> Result<(), MarketLensError>;

    fn write_predictions(
        &self,
        predictions: &[Prediction],
        output_path: &Path,
    ) -> Result<(), MarketLensError>;

    fn write_analysis(
        &self,
        report: &AnalysisReport,
        output_path: &Path,
    ) -> Result<(), MarketLensError>;
}
