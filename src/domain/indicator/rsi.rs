//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses a simple rolling mean (not Wilder smoothing) of gains and losses over
//! the trailing `n` bars. The first bar has no prior close and contributes a
//! zero delta.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 when avg_gain > 0, 50 for a flat window.
//!
//! Warmup: first n-1 bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    timestamp: b.timestamp,
                    valid: false,
                    value: 0.0,
                })
                .collect(),
        };
    }

    let mut gains = Vec::with_capacity(bars.len());
    let mut losses = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let change = if i == 0 {
            0.0
        } else {
            bars[i].close - bars[i - 1].close
        };
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        gain_sum += gains[i];
        loss_sum += losses[i];
        if i >= period {
            gain_sum -= gains[i - period];
            loss_sum -= losses[i - period];
        }

        if i + 1 < period {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: 0.0,
            });
            continue;
        }

        let avg_gain = (gain_sum / period as f64).max(0.0);
        let avg_loss = (loss_sum / period as f64).max(0.0);
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: rsi_value(avg_gain, avg_loss),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    // Running sums can leave residue around 1e-15 on windows that are exactly flat.
    const EPS: f64 = 1e-12;
    if avg_loss <= EPS {
        if avg_gain <= EPS { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
