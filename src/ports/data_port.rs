//! Market data port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::timeframe::Timeframe;

pub trait MarketDataPort {
    /// Most recent `limit` bars, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError>;

    /// Price of the latest trade.
    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError>;
}
