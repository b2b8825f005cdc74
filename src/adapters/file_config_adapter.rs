//! INI file configuration adapter.

use crate::domain::error::MarketLensError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MarketLensError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| MarketLensError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, MarketLensError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| MarketLensError::ConfigParse {
                file: "<inline>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.config.sections().iter().any(|s| s == section)
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    /// Blank values read as absent.
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[data]
dir = ./data
start_date = 2020-01-01
end_date = 2024-12-31

[backtest]
symbol = SPY
initial_capital = 250000.5
cost_method = turnover

[walk_forward]
step_size = 20

[portfolio]
symbols = SPY, QQQ, TLT
top_n = 3
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("data", "dir"), Some("./data".to_string()));
        assert_eq!(
            adapter.get_string("portfolio", "symbols"),
            Some("SPY, QQQ, TLT".to_string())
        );
        assert!(adapter.has_section("walk_forward"));
        assert!(!adapter.has_section("model"));
    }

    #[test]
    fn missing_and_blank_are_none() {
        let adapter =
            FileConfigAdapter::from_string("[model]\ntrain_end =\ntype = ridge\n").unwrap();
        assert_eq!(adapter.get_string("model", "train_end"), None);
        assert_eq!(adapter.get_string("model", "missing"), None);
        assert_eq!(adapter.get_string("nowhere", "type"), None);
        assert_eq!(adapter.get_string("model", "type"), Some("ridge".into()));
    }

    #[test]
    fn numeric_values_and_defaults() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_int("portfolio", "top_n", 2), 3);
        assert_eq!(adapter.get_int("portfolio", "warm_up_periods", 100), 100);
        assert_eq!(
            adapter.get_double("backtest", "initial_capital", 0.0),
            250000.5
        );
        assert_eq!(adapter.get_double("backtest", "slippage", 0.0005), 0.0005);
    }

    #[test]
    fn non_numeric_falls_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[portfolio]\ntop_n = many\nbuy_threshold = high\n")
                .unwrap();
        assert_eq!(adapter.get_int("portfolio", "top_n", 2), 2);
        assert_eq!(adapter.get_double("portfolio", "buy_threshold", 0.01), 0.01);
    }

    #[test]
    fn bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[flags]\na = yes\nb = Off\nc = maybe\n").unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(!adapter.get_bool("flags", "b", true));
        assert!(adapter.get_bool("flags", "c", true));
        assert!(!adapter.get_bool("flags", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(SAMPLE);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("backtest", "symbol"), Some("SPY".into()));
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(
            result,
            Err(MarketLensError::ConfigParse { file, .. }) if file.contains("config.ini")
        ));
    }
}
