//! INI file configuration adapter.

use crate::domain::error::TraderError;
use crate::ports::config_port::{ConfigPort, parse_bool};
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| TraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
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
            .as_ref()
            .and_then(|v| parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn reads_trading_sections() {
        let content = r#"
[alpaca]
base_url = https://paper-api.alpaca.markets

[trading]
symbols = AAPL,MSFT
trade_budget = 2500.5
lookback = 40

[strategy]
technical_mode = rsi_band
allow_long = no
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("alpaca", "base_url"),
            Some("https://paper-api.alpaca.markets".to_string())
        );
        assert_eq!(
            adapter.get_string("trading", "symbols"),
            Some("AAPL,MSFT".to_string())
        );
        assert_eq!(adapter.get_double("trading", "trade_budget", 0.0), 2500.5);
        assert_eq!(adapter.get_int("trading", "lookback", 0), 40);
        assert!(!adapter.get_bool("strategy", "allow_long", true));
    }

    #[test]
    fn missing_keys_use_defaults() {
        let adapter = FileConfigAdapter::from_string("[trading]\nlookback = 50\n").unwrap();
        assert_eq!(adapter.get_string("trading", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("trading", "min_bars", 20), 20);
        assert_eq!(adapter.get_double("retry", "jitter_secs", 1.0), 1.0);
        assert!(adapter.get_bool("strategy", "allow_short", true));
    }

    #[test]
    fn non_numeric_values_use_defaults() {
        let adapter =
            FileConfigAdapter::from_string("[trading]\nlookback = lots\ntrade_budget = n/a\n")
                .unwrap();
        assert_eq!(adapter.get_int("trading", "lookback", 50), 50);
        assert_eq!(adapter.get_double("trading", "trade_budget", 1000.0), 1000.0);
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[sentiment]\na = true\nb = YES\nc = on\nd = 0\ne = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("sentiment", "a", false));
        assert!(adapter.get_bool("sentiment", "b", false));
        assert!(adapter.get_bool("sentiment", "c", false));
        assert!(!adapter.get_bool("sentiment", "d", true));
        assert!(adapter.get_bool("sentiment", "e", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\nsource = csv\ncsv_dir = /var/bars\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "csv_dir"),
            Some("/var/bars".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/sigtrader.ini");
        assert!(matches!(result, Err(TraderError::ConfigParse { .. })));
    }
}
