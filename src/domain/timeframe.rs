//! Bar aggregation period.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Minute,
    FiveMinutes,
    FifteenMinutes,
    Hour,
    Day,
}

impl Timeframe {
    /// Alpaca-style label (`5Min`, `1Day`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Minute => "1Min",
            Timeframe::FiveMinutes => "5Min",
            Timeframe::FifteenMinutes => "15Min",
            Timeframe::Hour => "1Hour",
            Timeframe::Day => "1Day",
        }
    }

    pub fn step(&self) -> Duration {
        let secs = match self {
            Timeframe::Minute => 60,
            Timeframe::FiveMinutes => 5 * 60,
            Timeframe::FifteenMinutes => 15 * 60,
            Timeframe::Hour => 60 * 60,
            Timeframe::Day => 24 * 60 * 60,
        };
        Duration::from_secs(secs)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "1m" | "1min" | "minute" => Ok(Timeframe::Minute),
            "5m" | "5min" => Ok(Timeframe::FiveMinutes),
            "15m" | "15min" => Ok(Timeframe::FifteenMinutes),
            "1h" | "1hour" | "hour" => Ok(Timeframe::Hour),
            "1d" | "1day" | "day" => Ok(Timeframe::Day),
            _ => Err(format!("unsupported timeframe: {value}")),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
