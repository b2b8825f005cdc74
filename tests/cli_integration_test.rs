//! CLI integration tests.
//!
//! Tests cover:
//! - Config builders against INI files
//! - Each subcommand end to end over CSV fixtures in a temp directory
//! - Exit codes per error class

mod common;

use common::*;
use marketlens::adapters::file_config_adapter::FileConfigAdapter;
use marketlens::cli::{self, Cli, Command};
use marketlens::domain::model::ModelKind;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Temp data directory with SPY, QQQ and TLT histories.
fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let start = date(2022, 1, 3);
    for (symbol, price, drift) in [("SPY", 400.0, 0.0004), ("QQQ", 300.0, 0.0007), ("TLT", 100.0, -0.0002)] {
        write_csv(dir.path(), symbol, &generate_bars(symbol, start, 300, price, drift));
    }
    dir
}

fn ini(data: &Path, extra: &str) -> String {
    format!(
        "[data]\ndir = {}\nstart_date = 2022-01-01\nend_date = 2023-12-31\n{extra}",
        data.display()
    )
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

mod config_loading {
    use super::*;

    #[test]
    fn load_config_validates() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), "[backtest]\nsymbol = SPY\n"));
        assert!(cli::load_config(file.path()).is_ok());

        let file = write_temp_ini(&ini(dir.path(), "[backtest]\ninitial_capital = -5\n"));
        assert!(cli::load_config(file.path()).is_err());
    }

    #[test]
    fn builders_share_one_file() {
        let adapter = FileConfigAdapter::from_string(
            r#"
[data]
dir = ./data
start_date = 2020-01-01
end_date = 2024-12-31

[backtest]
initial_capital = 50000
transaction_cost = 0.002
risk_free_rate = 0.03

[model]
type = ensemble
ridge_alpha = 2.5

[portfolio]
top_n = 4
buy_threshold = 0.02
"#,
        )
        .unwrap();

        let bt = cli::build_backtest_config(&adapter).unwrap();
        assert_eq!(bt.initial_capital, 50_000.0);
        assert_eq!(bt.cost.cost_rate, 0.002);

        let sim = cli::build_simulator_config(&adapter).unwrap();
        assert_eq!(sim.initial_capital, 50_000.0);
        assert_eq!(sim.transaction_cost, 0.002);
        assert_eq!(sim.risk_free_rate, 0.03);
        assert_eq!(sim.top_n, 4);
        assert_eq!(sim.buy_threshold, 0.02);
        assert_eq!(sim.model_kind, ModelKind::Ensemble);

        let settings = cli::build_model_settings(&adapter).unwrap();
        assert_eq!(settings.ridge_alpha, 2.5);
        assert!(settings.train_end.is_none());
    }
}

mod commands {
    use super::*;

    fn run(command: Command) -> ExitCode {
        cli::run(Cli { command })
    }

    #[test]
    fn validate_succeeds() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), "[portfolio]\nsymbols = SPY,QQQ\n"));
        let code = run(Command::Validate {
            config: file.path().to_path_buf(),
        });
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let code = run(Command::Validate {
            config: PathBuf::from("/nonexistent/marketlens.ini"),
        });
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn invalid_value_is_config_error() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), "[model]\ntype = lstm\n"));
        let code = run(Command::Validate {
            config: file.path().to_path_buf(),
        });
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn static_backtest_writes_report() {
        let dir = data_dir();
        let out = dir.path().join("backtest.json");
        let file = write_temp_ini(&ini(
            dir.path(),
            "[backtest]\nsymbol = spy\nbenchmark = QQQ\n[model]\ntype = ridge\n",
        ));

        let code = run(Command::Backtest {
            config: file.path().to_path_buf(),
            symbol: None,
            mode: None,
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "backtest");
        assert_eq!(report["symbol"], "SPY");
        assert!(!report["equity_curve"].as_array().unwrap().is_empty());
        assert!(report["metrics"]["beta"].is_number());
    }

    #[test]
    fn walk_forward_mode_override() {
        let dir = data_dir();
        let out = dir.path().join("wf.json");
        let file = write_temp_ini(&ini(
            dir.path(),
            "[walk_forward]\ntrain_size = 120\nstep_size = 10\nretrain_frequency = 30\n[model]\ntype = ridge\n",
        ));

        let code = run(Command::Backtest {
            config: file.path().to_path_buf(),
            symbol: Some("TLT".into()),
            mode: Some("walk-forward".into()),
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "walk_forward");
        assert_eq!(report["metadata"]["train_size"], 120);
        assert_eq!(report["metadata"]["step_size"], 10);
        assert!(report["retrain_count"].as_u64().unwrap() >= 1);
        assert_eq!(
            report["predictions"].as_array().unwrap().len(),
            report["actuals"].as_array().unwrap().len()
        );
    }

    #[test]
    fn portfolio_writes_report() {
        let dir = data_dir();
        let out = dir.path().join("portfolio.json");
        let file = write_temp_ini(&ini(
            dir.path(),
            "[model]\ntype = ridge\ntrain_end = 2022-07-31\n[portfolio]\nsymbols = SPY,QQQ,TLT,MISSING\ntop_n = 2\n",
        ));

        let code = run(Command::Portfolio {
            config: file.path().to_path_buf(),
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "portfolio");
        assert_eq!(report["benchmark_symbol"], "SPY");
        assert_eq!(report["equity_curve"].as_array().unwrap().len(), 300 - 100 + 1);
        assert!(report["trades"].as_array().unwrap().len() <= 100);
        assert!(report["skip_counts"].get("MISSING").is_none());
        assert!(report["open_positions"].as_u64().unwrap() <= 2);
    }

    #[test]
    fn predict_writes_signals() {
        let dir = data_dir();
        let out = dir.path().join("predict.json");
        let file = write_temp_ini(&ini(dir.path(), "[model]\ntype = ridge\n"));

        let code = run(Command::Predict {
            config: file.path().to_path_buf(),
            symbols: Some("spy,tlt".into()),
            top: 4,
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "predict");
        let predictions = report["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0]["symbol"], "SPY");
        assert_eq!(predictions[1]["symbol"], "TLT");
        for p in predictions {
            assert!(["BUY", "SELL", "HOLD"].contains(&p["signal"].as_str().unwrap()));
            assert_eq!(p["top_features"].as_array().unwrap().len(), 4);
            let ret = p["predicted_return"].as_f64().unwrap();
            let price = p["current_price"].as_f64().unwrap();
            assert!((p["predicted_price"].as_f64().unwrap() - price * (1.0 + ret)).abs() < 1e-9);
        }
    }

    #[test]
    fn predict_unknown_symbols_is_no_data() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), ""));
        let code = run(Command::Predict {
            config: file.path().to_path_buf(),
            symbols: Some("NOPE,NADA".into()),
            top: 5,
            output: None,
        });
        assert_eq!(code, ExitCode::from(5));
    }

    #[test]
    fn analyze_writes_correlations() {
        let dir = data_dir();
        let out = dir.path().join("analysis.json");
        let file = write_temp_ini(&ini(dir.path(), "[portfolio]\nsymbols = SPY,QQQ,TLT\n"));

        let code = run(Command::Analyze {
            config: file.path().to_path_buf(),
            symbols: None,
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "analysis");
        assert_eq!(report["assets"].as_array().unwrap().len(), 3);
        assert_eq!(report["assets"][0]["statistics"]["data_points"], 300);
        assert_eq!(report["correlation"]["observations"], 299);
        let matrix = report["correlation"]["values"].as_array().unwrap();
        assert_eq!(matrix[1][1], 1.0);
        assert_eq!(matrix[0][2], matrix[2][0]);
        assert!(report["assets"][2]["indicators"]["sma_50"].is_number());
    }

    #[test]
    fn analyze_flags_disable_sections() {
        let dir = data_dir();
        let out = dir.path().join("analysis.json");
        let file = write_temp_ini(&ini(dir.path(), "[analysis]\ncorrelations = false\nindicators = false\n"));

        let code = run(Command::Analyze {
            config: file.path().to_path_buf(),
            symbols: Some("SPY,QQQ".into()),
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert!(report.get("correlation").is_none());
        assert!(report["assets"][0]["indicators"].is_null());
    }

    #[test]
    fn zero_warm_up_validates() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), "[portfolio]\nsymbols = SPY\nwarm_up_periods = 0\n"));
        let code = run(Command::Validate {
            config: file.path().to_path_buf(),
        });
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn portfolio_without_symbols_is_config_error() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), ""));
        let code = run(Command::Portfolio {
            config: file.path().to_path_buf(),
            output: None,
        });
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn stats_writes_metrics() {
        let dir = data_dir();
        let out = dir.path().join("stats.json");
        let file = write_temp_ini(&ini(dir.path(), ""));

        let code = run(Command::Stats {
            config: file.path().to_path_buf(),
            symbol: Some("QQQ".into()),
            output: Some(out.clone()),
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report = read_json(&out);
        assert_eq!(report["kind"], "stats");
        assert_eq!(report["symbol"], "QQQ");
        // bars, not the 299 returns derived from them
        assert_eq!(report["data_points"], 300);
        assert!(report["metrics"]["sharpe_ratio"].is_number());
    }

    #[test]
    fn unknown_symbol_is_no_data() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), ""));
        let code = run(Command::Stats {
            config: file.path().to_path_buf(),
            symbol: Some("NOPE".into()),
            output: None,
        });
        assert_eq!(code, ExitCode::from(5));
    }

    #[test]
    fn info_lists_symbols() {
        let dir = data_dir();
        let file = write_temp_ini(&ini(dir.path(), ""));
        let code = run(Command::Info {
            config: file.path().to_path_buf(),
            symbol: None,
        });
        assert_eq!(code, ExitCode::SUCCESS);
    }
}
