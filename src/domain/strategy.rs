//! Strategy configuration: which signals are computed and which entries they may open.
//!
//! The short-only RSI scanner, the long/short crossover trader and their
//! sentiment-enabled versions are all the same [`Strategy`] with different settings.

use crate::domain::indicator::IndicatorParams;
use crate::domain::position::{RiskLimits, Side};
use crate::domain::sentiment::SentimentThresholds;
use crate::domain::signal::{CombinePolicy, Signal};
use crate::domain::technical::{RsiBand, TechnicalMode};
use crate::ports::broker_port::OrderSide;

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSettings {
    pub enabled: bool,
    pub thresholds: SentimentThresholds,
    /// Upper bound on texts scored per symbol per cycle.
    pub max_texts: usize,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            thresholds: SentimentThresholds::default(),
            max_texts: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub technical_mode: TechnicalMode,
    pub indicators: IndicatorParams,
    pub rsi_band: RsiBand,
    pub risk: RiskLimits,
    pub sentiment: SentimentSettings,
    pub combine: CombinePolicy,
    pub allow_long: bool,
    pub allow_short: bool,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            name: "Unnamed".into(),
            technical_mode: TechnicalMode::default(),
            indicators: IndicatorParams::default(),
            rsi_band: RsiBand::default(),
            risk: RiskLimits::default(),
            sentiment: SentimentSettings::default(),
            combine: CombinePolicy::default(),
            allow_long: true,
            allow_short: true,
        }
    }
}

/// A new position the strategy wants to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub order_side: OrderSide,
    pub position_side: Side,
}

impl Strategy {
    /// Entry for a flat account, if `signal` opens one under this strategy.
    pub fn entry_for(&self, signal: Signal) -> Option<Entry> {
        match signal {
            Signal::Buy if self.allow_long => Some(Entry {
                order_side: OrderSide::Buy,
                position_side: Side::Long,
            }),
            Signal::Sell | Signal::Short if self.allow_short => Some(Entry {
                order_side: OrderSide::Sell,
                position_side: Side::Short,
            }),
            _ => None,
        }
    }
}

/// Whole units affordable with `budget` at `price`, never less than one.
pub fn entry_quantity(budget: f64, price: f64) -> u64 {
    if !(budget.is_finite() && price.is_finite() && price > 0.0) {
        return 1;
    }
    ((budget / price).floor() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_fields() {
        let s = Strategy::default();
        assert_eq!(s.technical_mode, TechnicalMode::MaCrossover);
        assert_eq!(s.indicators.rsi_period, 14);
        assert_eq!(s.risk.stop_loss_pct, 0.03);
        assert_eq!(s.risk.take_profit_pct, 0.05);
        assert!(!s.sentiment.enabled);
        assert_eq!(s.combine, CombinePolicy::SentimentOverride);
    }

    #[test]
    fn long_short_entries() {
        let s = Strategy::default();
        assert_eq!(
            s.entry_for(Signal::Buy),
            Some(Entry {
                order_side: OrderSide::Buy,
                position_side: Side::Long
            })
        );
        assert_eq!(s.entry_for(Signal::Sell).unwrap().position_side, Side::Short);
        assert_eq!(s.entry_for(Signal::Short).unwrap().order_side, OrderSide::Sell);
        assert_eq!(s.entry_for(Signal::Cover), None);
        assert_eq!(s.entry_for(Signal::None), None);
    }

    #[test]
    fn short_only_strategy_ignores_buy() {
        let s = Strategy {
            allow_long: false,
            ..Strategy::default()
        };
        assert_eq!(s.entry_for(Signal::Buy), None);
        assert!(s.entry_for(Signal::Short).is_some());
    }

    #[test]
    fn long_only_strategy_ignores_shorts() {
        let s = Strategy {
            allow_short: false,
            ..Strategy::default()
        };
        assert_eq!(s.entry_for(Signal::Sell), None);
        assert_eq!(s.entry_for(Signal::Short), None);
    }

    #[test]
    fn quantity_floors_and_has_minimum_one() {
        assert_eq!(entry_quantity(1000.0, 30.0), 33);
        assert_eq!(entry_quantity(1000.0, 2500.0), 1);
        assert_eq!(entry_quantity(0.0, 10.0), 1);
        assert_eq!(entry_quantity(1000.0, 0.0), 1);
    }
}
