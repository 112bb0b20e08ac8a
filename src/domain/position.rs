//! Open positions and the stop-loss / take-profit check applied to them.

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
        }
    }
}

/// Broker-reported position. `quantity` is always positive; direction is in `side`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub avg_entry_price: f64,
}

impl Position {
    /// Fractional return relative to entry, positive when the position is in profit.
    pub fn profit_pct(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.avg_entry_price) / self.avg_entry_price,
            Side::Short => (self.avg_entry_price - price) / self.avg_entry_price,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.profit_pct(price) * self.avg_entry_price * self.quantity
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        if !(self.avg_entry_price.is_finite() && self.avg_entry_price > 0.0) {
            return Err(TraderError::InvalidPosition {
                symbol: self.symbol.clone(),
                reason: format!("entry price {} is not positive", self.avg_entry_price),
            });
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(TraderError::InvalidPosition {
                symbol: self.symbol.clone(),
                reason: format!("quantity {} is not positive", self.quantity),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => f.write_str("take-profit"),
            ExitReason::StopLoss => f.write_str("stop-loss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskExit {
    pub reason: ExitReason,
    /// `Cover` for shorts, `Sell` for longs.
    pub signal: Signal,
    pub profit_pct: f64,
}

/// Stop-loss / take-profit fractions of entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.03,
            take_profit_pct: 0.05,
        }
    }
}

impl RiskLimits {
    /// Decide whether `position` must be closed at `price`.
    ///
    /// No position means nothing to manage. This never opens positions.
    pub fn check(
        &self,
        position: Option<&Position>,
        price: f64,
    ) -> Result<Option<RiskExit>, TraderError> {
        let Some(position) = position else {
            return Ok(None);
        };
        position.validate()?;
        if !(price.is_finite() && price > 0.0) {
            return Err(TraderError::MarketData {
                reason: format!("invalid price {} for {}", price, position.symbol),
            });
        }

        let profit_pct = position.profit_pct(price);
        let reason = if profit_pct >= self.take_profit_pct {
            ExitReason::TakeProfit
        } else if profit_pct <= -self.stop_loss_pct {
            ExitReason::StopLoss
        } else {
            return Ok(None);
        };

        let signal = match position.side {
            Side::Short => Signal::Cover,
            Side::Long => Signal::Sell,
        };
        Ok(Some(RiskExit {
            reason,
            signal,
            profit_pct,
        }))
    }
}
