//! Pretty-printed JSON report adapter.
//!
//! Non-finite floats (an all-winning profit factor) serialize as `null`.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::analysis::AnalysisReport;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::MarketLensError;
use crate::domain::metrics::MetricsReport;
use crate::domain::prediction::Prediction;
use crate::domain::simulator::PortfolioResult;
use crate::domain::walk_forward::WalkForwardResult;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<&'a str>,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }

    fn write_json<T: Serialize>(
        &self,
        kind: &str,
        symbol: Option<&str>,
        body: &T,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        let file = File::create(output_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &Envelope { kind, symbol, body })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(
        &self,
        symbol: &str,
        result: &BacktestResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        self.write_json("backtest", Some(symbol), result, output_path)
    }

    fn write_walk_forward(
        &self,
        symbol: &str,
        result: &WalkForwardResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        self.write_json("walk_forward", Some(symbol), result, output_path)
    }

    fn write_portfolio(
        &self,
        result: &PortfolioResult,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        self.write_json("portfolio", None, result, output_path)
    }

    fn write_metrics(
        &self,
        symbol: &str,
        metrics: &MetricsReport,
        data_points: usize,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        #[derive(Serialize)]
        struct Stats<'a> {
            data_points: usize,
            metrics: &'a MetricsReport,
        }
        self.write_json(
            "stats",
            Some(symbol),
            &Stats {
                data_points,
                metrics,
            },
            output_path,
        )
    }

    fn write_predictions(
        &self,
        predictions: &[Prediction],
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        #[derive(Serialize)]
        struct Predictions<'a> {
            predictions: &'a [Prediction],
        }
        self.write_json("predict", None, &Predictions { predictions }, output_path)
    }

    fn write_analysis(
        &self,
        report: &AnalysisReport,
        output_path: &Path,
    ) -> Result<(), MarketLensError> {
        self.write_json("analysis", None, report, output_path)
    }
}
