//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values
//! - `IndicatorSnapshot`: RSI and both moving averages for one bar

pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::domain::ohlcv::BarSeries;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn get(&self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

/// Periods used to build an [`IndicatorSnapshot`] series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            short_window: 5,
            long_window: 20,
        }
    }
}

impl IndicatorParams {
    /// Shortest series for which every indicator is defined on the final two bars.
    pub fn min_bars(&self) -> usize {
        self.rsi_period.max(self.long_window) + 1
    }
}

/// Indicator values for one bar; `None` during warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: Option<f64>,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
}

/// Compute RSI and short/long SMA for every bar, aligned index-for-index
/// with `series`.
pub fn compute_snapshots(
    series: &BarSeries,
    params: &IndicatorParams,
) -> Result<Vec<IndicatorSnapshot>, TraderError> {
    series.require(params.min_bars())?;

    let bars = series.bars();
    let rsi = rsi::calculate_rsi(bars, params.rsi_period);
    let short_ma = sma::calculate_sma(bars, params.short_window);
    let long_ma = sma::calculate_sma(bars, params.long_window);

    Ok(bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorSnapshot {
            timestamp: bar.timestamp,
            close: bar.close,
            rsi: rsi.values.get(i).and_then(IndicatorPoint::get),
            short_ma: short_ma.values.get(i).and_then(IndicatorPoint::get),
            long_ma: long_ma.values.get(i).and_then(IndicatorPoint::get),
        })
        .collect())
}
