//! Price bar representation.

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered bars for one symbol, strictly increasing by timestamp.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, TraderError> {
        let symbol = symbol.into();
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(TraderError::MalformedData {
                reason: format!(
                    "bars for {} not strictly increasing at index {}",
                    symbol,
                    pos + 1
                ),
            });
        }
        Ok(Self { symbol, bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Error unless the series holds at least `minimum` bars.
    pub fn require(&self, minimum: usize) -> Result<(), TraderError> {
        if self.bars.len() < minimum {
            return Err(TraderError::InsufficientData {
                symbol: self.symbol.clone(),
                bars: self.bars.len(),
                minimum,
            });
        }
        Ok(())
    }
}
