//! Configuration validation.
//!
//! Runs before the first cycle so that a bad setting halts startup instead of
//! surfacing halfway through a trading session. Every numeric and boolean key
//! is parsed strictly here; the lenient [`ConfigPort`] getters would otherwise
//! turn a typo into the default value.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::signal::CombinePolicy;
use crate::domain::technical::TechnicalMode;
use crate::domain::timeframe::Timeframe;
use crate::domain::universe::parse_symbols;
use crate::ports::broker_port::TimeInForce;
use crate::ports::config_port::{ConfigPort, parse_bool};

pub const KEY_ID_ENV: &str = "APCA_API_KEY_ID";
pub const SECRET_KEY_ENV: &str = "APCA_API_SECRET_KEY";

/// Upper bound for every duration setting (one week).
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// Upper bound for `[retry] max_attempts`.
pub const MAX_RETRY_ATTEMPTS: i64 = 100;

/// Credential from the environment, falling back to `[alpaca] <key>`.
/// Blank values count as absent.
pub fn credential(
    config: &dyn ConfigPort,
    key: &str,
    env_var: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<String> {
    env(env_var)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| config.get_string("alpaca", key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_credentials(
    config: &dyn ConfigPort,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), TraderError> {
    for (key, env_var) in [("key_id", KEY_ID_ENV), ("secret_key", SECRET_KEY_ENV)] {
        if credential(config, key, env_var, env).is_none() {
            return Err(TraderError::ConfigMissing {
                section: "alpaca".to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_symbols(config)?;
    parse_setting::<Timeframe>(config, "trading", "timeframe")?;
    parse_setting::<TimeInForce>(config, "trading", "time_in_force")?;
    let lookback = number(config, "trading", "lookback", 50i64)?;
    let min_bars = number(config, "trading", "min_bars", 20i64)?;
    require_positive_int(lookback, "trading", "lookback")?;
    require_positive_int(min_bars, "trading", "min_bars")?;
    if min_bars > lookback {
        return Err(invalid(
            "trading",
            "min_bars",
            "min_bars must not exceed lookback",
        ));
    }
    require_positive(
        number(config, "trading", "trade_budget", 1000.0)?,
        "trading",
        "trade_budget",
    )?;
    duration_setting(config, "trading", "cycle_interval_secs", 300.0)?;
    if number(config, "trading", "symbol_pause_ms", 500i64)? < 0 {
        return Err(invalid(
            "trading",
            "symbol_pause_ms",
            "symbol_pause_ms must be non-negative",
        ));
    }
    validate_data_source(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    parse_setting::<TechnicalMode>(config, "strategy", "technical_mode")?;
    parse_setting::<CombinePolicy>(config, "strategy", "combine")?;
    validate_windows(config)?;
    validate_rsi_band(config)?;
    validate_fraction(config, "strategy", "stop_loss", 0.03)?;
    validate_fraction(config, "strategy", "take_profit", 0.05)?;
    if !flag(config, "strategy", "allow_long", true)?
        && !flag(config, "strategy", "allow_short", true)?
    {
        return Err(invalid(
            "strategy",
            "allow_short",
            "at least one of allow_long/allow_short must be true",
        ));
    }
    validate_sentiment(config)?;
    Ok(())
}

pub fn validate_runtime_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_ranking(config)?;
    validate_retry(config)?;
    require_positive_int(
        number(config, "alpaca", "timeout_secs", 30i64)?,
        "alpaca",
        "timeout_secs",
    )?;
    Ok(())
}

/// Parse an optional enum-like setting. Absent keys are fine; callers use the default.
pub fn parse_setting<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TraderError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(section, key, &format!("{:?}: {e}", s.trim()))),
    }
}

/// Strictly parsed numeric setting; absent or blank keys take `default`.
pub fn number<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, TraderError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_setting(config, section, key)?.unwrap_or(default))
}

/// Strictly parsed boolean setting; absent or blank keys take `default`.
pub fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, TraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => parse_bool(&s).ok_or_else(|| {
            invalid(
                section,
                key,
                &format!("{:?} is not a boolean (true/false, yes/no, on/off, 1/0)", s.trim()),
            )
        }),
        _ => Ok(default),
    }
}

/// Duration setting given in seconds, between 0 and [`MAX_DURATION_SECS`].
pub fn duration_setting(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default_secs: f64,
) -> Result<Duration, TraderError> {
    let secs: f64 = number(config, section, key, default_secs)?;
    if !(secs.is_finite() && (0.0..=MAX_DURATION_SECS).contains(&secs)) {
        return Err(invalid(
            section,
            key,
            &format!("{key} must be between 0 and {MAX_DURATION_SECS} seconds"),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(section, key, &e.to_string()))
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("trading", "symbols") {
        Some(s) if !s.trim().is_empty() => parse_symbols(&s)
            .map(|_| ())
            .map_err(|e| invalid("trading", "symbols", &e.to_string())),
        _ => Err(TraderError::ConfigMissing {
            section: "trading".to_string(),
            key: "symbols".to_string(),
        }),
    }
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "alpaca".to_string());
    match source.trim().to_lowercase().as_str() {
        "alpaca" => Ok(()),
        "csv" => match config.get_string("data", "csv_dir") {
            Some(dir) if !dir.trim().is_empty() => Ok(()),
            _ => Err(TraderError::ConfigMissing {
                section: "data".to_string(),
                key: "csv_dir".to_string(),
            }),
        },
        other => Err(invalid(
            "data",
            "source",
            &format!("unknown data source {other:?}, expected alpaca or csv"),
        )),
    }
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let rsi = number(config, "strategy", "rsi_period", 14i64)?;
    let short = number(config, "strategy", "short_window", 5i64)?;
    let long = number(config, "strategy", "long_window", 20i64)?;
    require_positive_int(rsi, "strategy", "rsi_period")?;
    require_positive_int(short, "strategy", "short_window")?;
    require_positive_int(long, "strategy", "long_window")?;
    if short >= long {
        return Err(invalid(
            "strategy",
            "short_window",
            "short_window must be less than long_window",
        ));
    }

    let needed = IndicatorParams {
        rsi_period: rsi as usize,
        short_window: short as usize,
        long_window: long as usize,
    }
    .min_bars();
    let lookback = number(config, "trading", "lookback", 50i64)?;
    if lookback < needed as i64 {
        return Err(invalid(
            "trading",
            "lookback",
            &format!(
                "lookback {lookback} is too short for RSI({rsi}) and SMA({long}), need at least {needed}"
            ),
        ));
    }
    Ok(())
}

fn validate_rsi_band(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let lower = number(config, "strategy", "rsi_band_lower", 30.0)?;
    let upper = number(config, "strategy", "rsi_band_upper", 45.0)?;
    if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
        return Err(invalid(
            "strategy",
            "rsi_band_lower",
            "RSI band must satisfy 0 <= lower < upper <= 100",
        ));
    }
    Ok(())
}

fn validate_sentiment(config: &dyn ConfigPort) -> Result<(), TraderError> {
    flag(config, "sentiment", "enabled", false)?;
    let floor = number(config, "sentiment", "noise_floor", 0.2)?;
    let threshold = number(config, "sentiment", "threshold", 0.3)?;
    if !(0.0..=1.0).contains(&floor) {
        return Err(invalid(
            "sentiment",
            "noise_floor",
            "noise_floor must be between 0 and 1",
        ));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(
            "sentiment",
            "threshold",
            "threshold must be between 0 and 1",
        ));
    }
    require_positive_int(
        number(config, "sentiment", "max_texts", 20i64)?,
        "sentiment",
        "max_texts",
    )?;
    Ok(())
}

fn validate_ranking(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let select = number(config, "ranking", "select", 0i64)?;
    if select < 0 {
        return Err(invalid(
            "ranking",
            "select",
            "select must be non-negative",
        ));
    }
    parse_setting::<Timeframe>(config, "ranking", "timeframe")?;
    let min_bars = number(config, "ranking", "min_bars", 2i64)?;
    if min_bars < 2 {
        return Err(invalid(
            "ranking",
            "min_bars",
            "min_bars must be at least 2",
        ));
    }
    if number(config, "ranking", "lookback", 5i64)? < min_bars {
        return Err(invalid(
            "ranking",
            "lookback",
            "lookback must be at least min_bars",
        ));
    }
    Ok(())
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let attempts = number(config, "retry", "max_attempts", 5i64)?;
    if !(1..=MAX_RETRY_ATTEMPTS).contains(&attempts) {
        return Err(invalid(
            "retry",
            "max_attempts",
            &format!("max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}"),
        ));
    }
    for key in ["base_delay_secs", "step_secs", "jitter_secs"] {
        duration_setting(config, "retry", key, 1.0)?;
    }
    Ok(())
}

fn validate_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), TraderError> {
    let value = number(config, section, key, default)?;
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(
            section,
            key,
            &format!("{key} must be between 0 and 1 (exclusive)"),
        ));
    }
    Ok(())
}

fn require_positive_int(value: i64, section: &str, key: &str) -> Result<(), TraderError> {
    if value <= 0 {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(())
}

fn require_positive(value: f64, section: &str, key: &str) -> Result<(), TraderError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn valid_trading_config_passes() {
        let config = make_config(
            r#"
[trading]
symbols = AAPL, MSFT, NIO
timeframe = 5Min
lookback = 50
min_bars = 20
trade_budget = 1000
time_in_force = day
"#,
        );
        assert!(validate_trading_config(&config).is_ok());
    }

    #[test]
    fn missing_symbols_fails() {
        let config = make_config("[trading]\nlookback = 50\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { ref key, .. } if key == "symbols"));
    }

    #[test]
    fn malformed_symbols_fail() {
        let config = make_config("[trading]\nsymbols = AAPL,,MSFT\n");
        assert!(matches!(
            validate_trading_config(&config),
            Err(TraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn unknown_timeframe_fails() {
        let config = make_config("[trading]\nsymbols = AAPL\ntimeframe = 7Min\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "timeframe"));
    }

    #[test]
    fn min_bars_above_lookback_fails() {
        let config = make_config("[trading]\nsymbols = AAPL\nlookback = 10\nmin_bars = 20\n");
        assert!(validate_trading_config(&config).is_err());
    }

    #[test]
    fn zero_budget_fails() {
        let config = make_config("[trading]\nsymbols = AAPL\ntrade_budget = 0\n");
        assert!(validate_trading_config(&config).is_err());
    }

    #[test]
    fn csv_source_requires_dir() {
        let config = make_config("[trading]\nsymbols = AAPL\n[data]\nsource = csv\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { ref key, .. } if key == "csv_dir"));

        let config =
            make_config("[trading]\nsymbols = AAPL\n[data]\nsource = csv\ncsv_dir = /tmp/bars\n");
        assert!(validate_trading_config(&config).is_ok());
    }

    #[test]
    fn unknown_source_fails() {
        let config = make_config("[trading]\nsymbols = AAPL\n[data]\nsource = yahoo\n");
        assert!(validate_trading_config(&config).is_err());
    }

    #[test]
    fn default_strategy_config_passes() {
        let config = make_config("[strategy]\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn short_window_must_be_below_long() {
        let config = make_config("[strategy]\nshort_window = 20\nlong_window = 20\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn inverted_rsi_band_fails() {
        let config = make_config("[strategy]\nrsi_band_lower = 45\nrsi_band_upper = 30\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn stop_loss_out_of_range_fails() {
        let config = make_config("[strategy]\nstop_loss = 0\n");
        assert!(validate_strategy_config(&config).is_err());
        let config = make_config("[strategy]\ntake_profit = 1.5\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn both_sides_disabled_fails() {
        let config = make_config("[strategy]\nallow_long = false\nallow_short = no\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn unknown_modes_fail() {
        let config = make_config("[strategy]\ntechnical_mode = macd\n");
        assert!(validate_strategy_config(&config).is_err());
        let config = make_config("[strategy]\ncombine = vote\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn sentiment_bounds() {
        let config = make_config("[sentiment]\nnoise_floor = -0.1\n");
        assert!(validate_strategy_config(&config).is_err());
        let config = make_config("[sentiment]\nthreshold = 1.2\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn runtime_defaults_pass() {
        let config = make_config("[trading]\nsymbols = A\n");
        assert!(validate_runtime_config(&config).is_ok());
    }

    #[test]
    fn ranking_min_bars_at_least_two() {
        let config = make_config("[ranking]\nselect = 5\nmin_bars = 1\n");
        assert!(validate_runtime_config(&config).is_err());
    }

    #[test]
    fn retry_attempts_positive() {
        let config = make_config("[retry]\nmax_attempts = 0\n");
        assert!(validate_runtime_config(&config).is_err());
        let config = make_config("[retry]\njitter_secs = -1\n");
        assert!(validate_runtime_config(&config).is_err());
    }

    #[test]
    fn lookback_must_cover_indicator_warmup() {
        let config = make_config("[trading]\nsymbols = AAPL\nlookback = 20\nmin_bars = 20\n");
        assert!(validate_trading_config(&config).is_ok());
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "lookback"));

        let config = make_config("[trading]\nlookback = 21\n");
        assert!(validate_strategy_config(&config).is_ok());

        let config = make_config("[trading]\nlookback = 25\n[strategy]\nrsi_period = 30\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let config = make_config("[trading]\nsymbols = AAPL\ntrade_budget = 5,000\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "trade_budget"));

        let config = make_config("[strategy]\nstop_loss = 2%\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "stop_loss"));

        let config = make_config("[trading]\nsymbols = AAPL\nlookback = fifty\n");
        assert!(validate_trading_config(&config).is_err());

        let config = make_config("[ranking]\nselect = 2.5\n");
        assert!(validate_runtime_config(&config).is_err());
    }

    #[test]
    fn malformed_booleans_are_rejected() {
        let config = make_config("[strategy]\nallow_long = maybe\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "allow_long"));

        let config = make_config("[sentiment]\nenabled = ture\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn numbers_parse_with_surrounding_space() {
        let config = make_config("[trading]\nlookback =  40 \n");
        assert_eq!(number(&config, "trading", "lookback", 50i64).unwrap(), 40);
        assert_eq!(number(&config, "trading", "min_bars", 20i64).unwrap(), 20);
        assert!(flag(&config, "strategy", "allow_long", true).unwrap());
    }

    #[test]
    fn durations_are_bounded() {
        let config = make_config("[trading]\nsymbols = AAPL\ncycle_interval_secs = 1e30\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(
            matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "cycle_interval_secs")
        );

        let config = make_config("[retry]\nbase_delay_secs = 1e30\n");
        assert!(validate_runtime_config(&config).is_err());
        let config = make_config("[retry]\nstep_secs = inf\n");
        assert!(validate_runtime_config(&config).is_err());

        let config = make_config("[retry]\nbase_delay_secs = 0.25\n");
        assert_eq!(
            duration_setting(&config, "retry", "base_delay_secs", 1.0).unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            duration_setting(&config, "retry", "step_secs", 1.0).unwrap(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn retry_attempts_bounded() {
        let config = make_config("[retry]\nmax_attempts = 1000\n");
        assert!(validate_runtime_config(&config).is_err());
    }

    #[test]
    fn missing_credentials_fail() {
        let config = make_config("[alpaca]\nkey_id = abc\n");
        let err = validate_credentials(&config, &no_env).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { ref key, .. } if key == "secret_key"));
    }

    #[test]
    fn env_credentials_override_file() {
        let config = make_config("[alpaca]\nkey_id = from-file\n");
        let env = |name: &str| match name {
            KEY_ID_ENV => Some("from-env".to_string()),
            SECRET_KEY_ENV => Some("secret".to_string()),
            _ => None,
        };
        assert!(validate_credentials(&config, &env).is_ok());
        assert_eq!(
            credential(&config, "key_id", KEY_ID_ENV, &env).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            credential(&config, "key_id", KEY_ID_ENV, &no_env).as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let config = make_config("[alpaca]\nkey_id =   \nsecret_key = s\n");
        assert!(validate_credentials(&config, &no_env).is_err());
    }
}
