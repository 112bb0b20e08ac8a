#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use sigtrader::domain::cycle::CycleConfig;
use sigtrader::domain::error::TraderError;
pub use sigtrader::domain::ohlcv::PriceBar;
use sigtrader::domain::position::{Position, Side};
use sigtrader::domain::timeframe::Timeframe;
use sigtrader::ports::broker_port::{BrokerPort, OrderAck, OrderRequest};
use sigtrader::ports::clock_port::Sleeper;
use sigtrader::ports::data_port::MarketDataPort;
use sigtrader::ports::sentiment_port::{SentimentScorer, TextSource};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

fn outage(reason: &str) -> TraderError {
    TraderError::MarketData {
        reason: reason.to_string(),
    }
}

#[derive(Default)]
pub struct MockMarketData {
    pub bars: HashMap<String, Vec<PriceBar>>,
    pub prices: HashMap<String, f64>,
    pub errors: HashMap<String, String>,
    /// Remaining transient failures before `fetch_bars` succeeds.
    pub flaky: RefCell<HashMap<String, u32>>,
    pub calls: RefCell<Vec<String>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_flaky(self, symbol: &str, failures: u32) -> Self {
        self.flaky.borrow_mut().insert(symbol.to_string(), failures);
        self
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.ends_with(&format!(":{symbol}")))
            .count()
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        self.calls.borrow_mut().push(format!("bars:{symbol}"));
        if let Some(reason) = self.errors.get(symbol) {
            return Err(outage(reason));
        }
        if let Some(remaining) = self.flaky.borrow_mut().get_mut(symbol) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(outage("temporary outage"));
            }
        }
        let bars = self.bars.get(symbol).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars[skip..].to_vec())
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        self.calls.borrow_mut().push(format!("price:{symbol}"));
        if let Some(price) = self.prices.get(symbol) {
            return Ok(*price);
        }
        self.bars
            .get(symbol)
            .and_then(|b| b.last())
            .map(|b| b.close)
            .ok_or_else(|| outage("no quote"))
    }
}

/// Broker fake that honours `client_order_id`: a resubmission acknowledges
/// the order already on the book instead of adding another.
#[derive(Default)]
pub struct MockBroker {
    pub positions: HashMap<String, Position>,
    pub position_errors: HashMap<String, String>,
    pub orders: RefCell<Vec<OrderRequest>>,
    /// Every submit call, duplicates included.
    pub submissions: RefCell<Vec<OrderRequest>>,
    /// Submits that place the order but time out before acknowledging it.
    pub lost_acks: Cell<u32>,
    pub position_calls: RefCell<Vec<String>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.insert(position.symbol.clone(), position);
        self
    }

    pub fn with_position_error(mut self, symbol: &str, reason: &str) -> Self {
        self.position_errors
            .insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_lost_acks(self, count: u32) -> Self {
        self.lost_acks.set(count);
        self
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.borrow().clone()
    }

    pub fn submissions(&self) -> Vec<OrderRequest> {
        self.submissions.borrow().clone()
    }
}

impl BrokerPort for MockBroker {
    fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, TraderError> {
        self.position_calls.borrow_mut().push(symbol.to_string());
        if let Some(reason) = self.position_errors.get(symbol) {
            return Err(TraderError::Broker {
                reason: reason.clone(),
            });
        }
        Ok(self.positions.get(symbol).cloned())
    }

    fn submit_market_order(&self, order: &OrderRequest) -> Result<OrderAck, TraderError> {
        self.submissions.borrow_mut().push(order.clone());
        let mut orders = self.orders.borrow_mut();
        let index = match orders
            .iter()
            .position(|o| o.client_order_id == order.client_order_id)
        {
            Some(index) => index,
            None => {
                orders.push(order.clone());
                orders.len() - 1
            }
        };
        if self.lost_acks.get() > 0 {
            self.lost_acks.set(self.lost_acks.get() - 1);
            return Err(TraderError::Broker {
                reason: "operation timed out".to_string(),
            });
        }
        Ok(OrderAck {
            order_id: format!("order-{}", index + 1),
            status: "accepted".to_string(),
        })
    }
}

/// Text source returning canned texts; unknown symbols have none.
#[derive(Default)]
pub struct MockTexts {
    pub texts: HashMap<String, Vec<String>>,
    pub unavailable: bool,
}

impl MockTexts {
    pub fn with_texts(mut self, symbol: &str, texts: &[&str]) -> Self {
        self.texts.insert(
            symbol.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn unavailable() -> Self {
        Self {
            texts: HashMap::new(),
            unavailable: true,
        }
    }
}

impl TextSource for MockTexts {
    fn search(&self, symbol: &str) -> Result<Vec<String>, TraderError> {
        if self.unavailable {
            return Err(TraderError::Sentiment {
                reason: "news API down".to_string(),
            });
        }
        Ok(self.texts.get(symbol).cloned().unwrap_or_default())
    }
}

/// Scores a text by parsing it as a number, so tests can pick exact scores.
pub struct NumericScorer;

impl SentimentScorer for NumericScorer {
    fn score(&self, text: &str) -> f64 {
        text.trim().parse().unwrap_or(0.0)
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub waits: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }

    pub fn count(&self, duration: Duration) -> usize {
        self.waits.borrow().iter().filter(|d| **d == duration).count()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
}

/// Five-minute bars with the given closes.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: start_time() + ChronoDuration::minutes(5 * i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// `flat` bars at 100 followed by `rising` bars climbing by 1.
pub fn flat_then_rising(flat: usize, rising: usize) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..flat)
        .map(|_| 100.0)
        .chain((1..=rising).map(|i| 100.0 + i as f64))
        .collect();
    bars_from_closes(&closes)
}

/// Strictly increasing closes starting at `start`.
pub fn rising(count: usize, start: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count).map(|i| start + i as f64).collect();
    bars_from_closes(&closes)
}

pub fn flat(count: usize, price: f64) -> Vec<PriceBar> {
    bars_from_closes(&vec![price; count])
}

/// 21 bars whose last 14 deltas are 5 gains and 9 losses of 1.0,
/// giving RSI(14) = 100 - 100 / (1 + 5/9) ≈ 35.7 on the final bar.
pub fn mid_low_rsi() -> Vec<PriceBar> {
    let deltas = [
        -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0,
    ];
    let mut closes = vec![50.0; 7];
    for d in deltas {
        let last = *closes.last().unwrap();
        closes.push(last + d);
    }
    bars_from_closes(&closes)
}

pub fn short_position(symbol: &str, quantity: f64, entry: f64) -> Position {
    Position {
        symbol: symbol.to_string(),
        side: Side::Short,
        quantity,
        avg_entry_price: entry,
    }
}

pub fn long_position(symbol: &str, quantity: f64, entry: f64) -> Position {
    Position {
        symbol: symbol.to_string(),
        side: Side::Long,
        quantity,
        avg_entry_price: entry,
    }
}

pub fn cycle_config(symbols: &[&str]) -> CycleConfig {
    CycleConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..CycleConfig::default()
    }
}
