//! Technical signal rules over indicator snapshots.
//!
//! Both rules look only at the last two snapshot rows (`prev`, `latest`) and
//! never fail: missing warm-up values produce [`Signal::None`].

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TechnicalMode {
    #[default]
    MaCrossover,
    RsiBand,
}

impl FromStr for TechnicalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ma_crossover" | "crossover" => Ok(TechnicalMode::MaCrossover),
            "rsi_band" | "rsi" => Ok(TechnicalMode::RsiBand),
            other => Err(format!(
                "unknown technical mode {other:?} (expected ma_crossover or rsi_band)"
            )),
        }
    }
}

impl fmt::Display for TechnicalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TechnicalMode::MaCrossover => f.write_str("ma_crossover"),
            TechnicalMode::RsiBand => f.write_str("rsi_band"),
        }
    }
}

/// Exclusive RSI band that marks a short entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiBand {
    pub lower: f64,
    pub upper: f64,
}

impl Default for RsiBand {
    fn default() -> Self {
        Self {
            lower: 30.0,
            upper: 45.0,
        }
    }
}

impl RsiBand {
    pub fn signal(&self, rsi: Option<f64>) -> Signal {
        match rsi {
            Some(v) if v > self.lower && v < self.upper => Signal::Short,
            _ => Signal::None,
        }
    }
}

/// Crossover between two consecutive rows.
pub fn crossover(prev: &IndicatorSnapshot, latest: &IndicatorSnapshot) -> Signal {
    let (Some(ps), Some(pl), Some(ls), Some(ll)) =
        (prev.short_ma, prev.long_ma, latest.short_ma, latest.long_ma)
    else {
        return Signal::None;
    };

    if ps <= pl && ls > ll {
        Signal::Buy
    } else if ps >= pl && ls < ll {
        Signal::Sell
    } else {
        Signal::None
    }
}

/// Signal for the most recent bar under `mode`.
pub fn technical_signal(
    mode: TechnicalMode,
    band: &RsiBand,
    snapshots: &[IndicatorSnapshot],
) -> Signal {
    match mode {
        TechnicalMode::RsiBand => band.signal(snapshots.last().and_then(|s| s.rsi)),
        TechnicalMode::MaCrossover => match snapshots {
            [.., prev, latest] => crossover(prev, latest),
            _ => Signal::None,
        },
    }
}

/// Crossover signal at every bar; the first bar is always `None`.
pub fn crossover_scan(snapshots: &[IndicatorSnapshot]) -> Vec<Signal> {
    let mut out = Vec::with_capacity(snapshots.len());
    if snapshots.is_empty() {
        return out;
    }
    out.push(Signal::None);
    out.extend(snapshots.windows(2).map(|w| crossover(&w[0], &w[1])));
    out
}
