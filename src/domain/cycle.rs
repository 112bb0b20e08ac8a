//! The trading loop: per-symbol signal evaluation, entry and exit.
//!
//! Each symbol goes through the same fixed sequence within a cycle: bars are
//! fetched, indicators and the technical signal computed, the position read
//! fresh from the broker, then either the risk check runs (open position) or
//! the combined signal may open one (flat). A failure for one symbol is
//! recorded in the [`CycleReport`] and the cycle moves on.

use std::cell::Cell;
use std::fmt;
use std::time::Duration;

use chrono::Utc;

use crate::domain::error::TraderError;
use crate::domain::indicator::compute_snapshots;
use crate::domain::ohlcv::BarSeries;
use crate::domain::position::{ExitReason, Side};
use crate::domain::retry::{CallOutcome, ResilientCaller, RetryPolicy};
use crate::domain::sentiment::aggregate_scores;
use crate::domain::signal::{CombinePolicy, Signal, combine};
use crate::domain::strategy::{Strategy, entry_quantity};
use crate::domain::technical::technical_signal;
use crate::domain::timeframe::Timeframe;
use crate::domain::universe::{SymbolRank, rank_worst_performers, validate_symbol};
use crate::ports::broker_port::{BrokerPort, OrderRequest, OrderSide, TimeInForce};
use crate::ports::clock_port::Sleeper;
use crate::ports::data_port::MarketDataPort;
use crate::ports::sentiment_port::{SentimentScorer, TextSource};

/// Universe narrowing applied at the start of each cycle. `select == 0` trades
/// the configured symbols as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub select: usize,
    pub timeframe: Timeframe,
    pub lookback: usize,
    pub min_bars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            select: 0,
            timeframe: Timeframe::Day,
            lookback: 5,
            min_bars: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    /// Bars requested per symbol.
    pub lookback: usize,
    /// Bars required before a symbol is evaluated at all.
    pub min_bars: usize,
    /// Dollar budget per new entry.
    pub trade_budget: f64,
    pub time_in_force: TimeInForce,
    pub cycle_interval: Duration,
    /// Courtesy delay between consecutive symbols.
    pub symbol_pause: Duration,
    pub ranking: RankingConfig,
    pub retry: RetryPolicy,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            timeframe: Timeframe::FiveMinutes,
            lookback: 50,
            min_bars: 20,
            trade_budget: 1000.0,
            time_in_force: TimeInForce::Day,
            cycle_interval: Duration::from_secs(300),
            symbol_pause: Duration::from_millis(500),
            ranking: RankingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Optional sentiment collaborators.
#[derive(Clone, Copy)]
pub struct SentimentFeed<'a> {
    pub scorer: &'a dyn SentimentScorer,
    pub source: &'a dyn TextSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Nothing could be evaluated this cycle (data unavailable or too short).
    Skipped { reason: String },
    /// Evaluated; the signal did not lead to an order.
    NoAction { signal: Signal },
    Entered {
        signal: Signal,
        side: OrderSide,
        quantity: f64,
        price: f64,
        order_id: String,
    },
    Exited {
        reason: ExitReason,
        side: OrderSide,
        quantity: f64,
        price: f64,
        order_id: String,
    },
    Failed { error: TraderError },
}

impl SymbolOutcome {
    fn from_error(error: TraderError) -> Self {
        match error {
            TraderError::InsufficientData { .. } | TraderError::DependencyUnavailable { .. } => {
                SymbolOutcome::Skipped {
                    reason: error.to_string(),
                }
            }
            error => SymbolOutcome::Failed { error },
        }
    }

    pub fn placed_order(&self) -> bool {
        matches!(
            self,
            SymbolOutcome::Entered { .. } | SymbolOutcome::Exited { .. }
        )
    }
}

impl fmt::Display for SymbolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            SymbolOutcome::NoAction { signal } => write!(f, "no action (signal {signal})"),
            SymbolOutcome::Entered {
                side,
                quantity,
                price,
                ..
            } => write!(f, "entered {side} {quantity} @ {price:.2}"),
            SymbolOutcome::Exited {
                reason,
                side,
                quantity,
                price,
                ..
            } => write!(f, "exited {side} {quantity} @ {price:.2} on {reason}"),
            SymbolOutcome::Failed { error } => write!(f, "failed ({error})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub ranked: Vec<SymbolRank>,
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }

    pub fn orders_placed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.placed_order()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Skipped { .. }))
            .count()
    }
}

pub struct TradingCycle<'a> {
    market: &'a dyn MarketDataPort,
    broker: &'a dyn BrokerPort,
    sentiment: Option<SentimentFeed<'a>>,
    strategy: &'a Strategy,
    config: &'a CycleConfig,
    sleeper: &'a dyn Sleeper,
    /// Start time of this run, part of every client order id.
    session: String,
    cycle: Cell<u64>,
}

impl<'a> TradingCycle<'a> {
    pub fn new(
        market: &'a dyn MarketDataPort,
        broker: &'a dyn BrokerPort,
        strategy: &'a Strategy,
        config: &'a CycleConfig,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            market,
            broker,
            sentiment: None,
            strategy,
            config,
            sleeper,
            session: Utc::now().format("%Y%m%d%H%M%S").to_string(),
            cycle: Cell::new(0),
        }
    }

    pub fn with_sentiment(mut self, feed: SentimentFeed<'a>) -> Self {
        self.sentiment = Some(feed);
        self
    }

    fn caller(&self) -> ResilientCaller<'a> {
        ResilientCaller::new(self.config.retry, self.sleeper)
    }

    /// Idempotency key for the order `symbol` may place in the current cycle.
    /// Retries of one submission reuse it; later cycles and runs do not.
    pub fn client_order_id(&self, symbol: &str, side: OrderSide) -> String {
        format!(
            "sig-{}-{}-{}-{}",
            self.session,
            self.cycle.get(),
            symbol.replace('/', ""),
            side
        )
    }

    fn pause(&self) {
        if !self.config.symbol_pause.is_zero() {
            self.sleeper.sleep(self.config.symbol_pause);
        }
    }

    /// Rank the configured universe and keep the worst performers.
    ///
    /// Symbols whose ranking bars cannot be fetched are left out of the
    /// ranking, the same as symbols with too little history.
    pub fn rank_symbols(&self) -> Vec<SymbolRank> {
        let ranking = &self.config.ranking;
        let caller = self.caller();
        let mut candidates = Vec::with_capacity(self.config.symbols.len());

        for (i, symbol) in self.config.symbols.iter().enumerate() {
            if i > 0 {
                self.pause();
            }
            let bars = match validate_symbol(symbol) {
                Ok(()) => caller
                    .call("fetch_bars", || {
                        self.market
                            .fetch_bars(symbol, ranking.timeframe, ranking.lookback)
                    })
                    .into_result("fetch_bars"),
                Err(e) => Err(e),
            };
            match bars {
                Ok(bars) => candidates.push((symbol.clone(), Some(bars))),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "excluded from ranking");
                    candidates.push((symbol.clone(), None));
                }
            }
        }

        let ranked = rank_worst_performers(&candidates, ranking.min_bars, ranking.select);
        for rank in &ranked {
            tracing::info!(
                symbol = %rank.symbol,
                performance_pct = rank.performance_pct * 100.0,
                "selected"
            );
        }
        ranked
    }

    /// Evaluate one symbol and place at most one order for it.
    pub fn process_symbol(&self, symbol: &str) -> Result<SymbolOutcome, TraderError> {
        validate_symbol(symbol)?;
        let caller = self.caller();

        let bars = caller
            .call("fetch_bars", || {
                self.market
                    .fetch_bars(symbol, self.config.timeframe, self.config.lookback)
            })
            .into_result("fetch_bars")?;
        let series = BarSeries::new(symbol, bars)?;
        series.require(self.config.min_bars)?;

        let snapshots = compute_snapshots(&series, &self.strategy.indicators)?;
        let technical = technical_signal(
            self.strategy.technical_mode,
            &self.strategy.rsi_band,
            &snapshots,
        );
        tracing::debug!(
            bars = series.len(),
            mode = %self.strategy.technical_mode,
            signal = %technical,
            "technical signal"
        );

        let position = caller
            .call("fetch_position", || self.broker.fetch_position(symbol))
            .into_result("fetch_position")?;

        match position {
            Some(position) => {
                position.validate()?;
                let price = self.latest_price(&caller, symbol)?;
                let Some(exit) = self.strategy.risk.check(Some(&position), price)? else {
                    tracing::debug!(
                        side = %position.side,
                        profit_pct = position.profit_pct(price) * 100.0,
                        unrealized_pnl = position.unrealized_pnl(price),
                        "position held"
                    );
                    return Ok(SymbolOutcome::NoAction { signal: Signal::None });
                };

                let side = match position.side {
                    Side::Long => OrderSide::Sell,
                    Side::Short => OrderSide::Buy,
                };
                let order = OrderRequest {
                    symbol: symbol.to_string(),
                    side,
                    quantity: position.quantity,
                    time_in_force: self.config.time_in_force,
                    client_order_id: self.client_order_id(symbol, side),
                };
                let ack = caller
                    .call("submit_order", || self.broker.submit_market_order(&order))
                    .into_result("submit_order")?;
                tracing::info!(
                    reason = %exit.reason,
                    signal = %exit.signal,
                    side = %side,
                    quantity = order.quantity,
                    price,
                    profit_pct = exit.profit_pct * 100.0,
                    order_id = %ack.order_id,
                    client_order_id = %order.client_order_id,
                    "exit order submitted"
                );
                Ok(SymbolOutcome::Exited {
                    reason: exit.reason,
                    side,
                    quantity: order.quantity,
                    price,
                    order_id: ack.order_id,
                })
            }
            None => {
                let sentiment = self.sentiment_signal(&caller, symbol);
                let signal = combine(self.strategy.combine, technical, sentiment);
                let Some(entry) = self.strategy.entry_for(signal) else {
                    return Ok(SymbolOutcome::NoAction { signal });
                };

                let price = self.latest_price(&caller, symbol)?;
                let quantity = entry_quantity(self.config.trade_budget, price) as f64;
                let order = OrderRequest {
                    symbol: symbol.to_string(),
                    side: entry.order_side,
                    quantity,
                    time_in_force: self.config.time_in_force,
                    client_order_id: self.client_order_id(symbol, entry.order_side),
                };
                let ack = caller
                    .call("submit_order", || self.broker.submit_market_order(&order))
                    .into_result("submit_order")?;
                tracing::info!(
                    signal = %signal,
                    technical = %technical,
                    sentiment = %sentiment,
                    position = %entry.position_side,
                    quantity,
                    price,
                    order_id = %ack.order_id,
                    client_order_id = %order.client_order_id,
                    "entry order submitted"
                );
                Ok(SymbolOutcome::Entered {
                    signal,
                    side: entry.order_side,
                    quantity,
                    price,
                    order_id: ack.order_id,
                })
            }
        }
    }

    fn latest_price(&self, caller: &ResilientCaller<'_>, symbol: &str) -> Result<f64, TraderError> {
        let price = caller
            .call("latest_price", || self.market.latest_price(symbol))
            .into_result("latest_price")?;
        if !(price.is_finite() && price > 0.0) {
            return Err(TraderError::MarketData {
                reason: format!("invalid latest price {price} for {symbol}"),
            });
        }
        Ok(price)
    }

    /// Sentiment signal for `symbol`, or `None` when disabled or unavailable.
    fn sentiment_signal(&self, caller: &ResilientCaller<'_>, symbol: &str) -> Signal {
        let settings = &self.strategy.sentiment;
        if !settings.enabled || self.strategy.combine == CombinePolicy::TechnicalOnly {
            return Signal::None;
        }
        let Some(feed) = self.sentiment else {
            return Signal::None;
        };

        let texts = match caller.call("search_text", || feed.source.search(symbol)) {
            CallOutcome::Ready(texts) => texts,
            CallOutcome::Unavailable { last_error, .. } | CallOutcome::Rejected(last_error) => {
                tracing::warn!(error = %last_error, "sentiment unavailable, using technical signal");
                return Signal::None;
            }
        };

        let scores: Vec<f64> = texts
            .iter()
            .take(settings.max_texts)
            .map(|text| feed.scorer.score(text))
            .collect();
        match aggregate_scores(&scores) {
            Some(score) => {
                let signal = settings.thresholds.signal(score);
                tracing::debug!(texts = scores.len(), score, signal = %signal, "sentiment signal");
                signal
            }
            None => Signal::None,
        }
    }

    /// One full pass over the selected symbols, pauses included.
    pub fn run_once(&self, cycle: u64) -> CycleReport {
        let span = tracing::info_span!("cycle", cycle);
        let _guard = span.enter();
        self.cycle.set(cycle);

        let (ranked, symbols) = if self.config.ranking.select > 0 {
            let ranked = self.rank_symbols();
            let symbols: Vec<String> = ranked.iter().map(|r| r.symbol.clone()).collect();
            if !symbols.is_empty() {
                self.pause();
            }
            (ranked, symbols)
        } else {
            (Vec::new(), self.config.symbols.clone())
        };

        let mut outcomes = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                self.pause();
            }
            let span = tracing::info_span!("symbol", symbol = %symbol);
            let _guard = span.enter();

            let outcome = match self.process_symbol(symbol) {
                Ok(outcome) => outcome,
                Err(e) => SymbolOutcome::from_error(e),
            };
            match &outcome {
                SymbolOutcome::Failed { error } => {
                    tracing::error!(error = %error, "symbol failed");
                }
                SymbolOutcome::Skipped { reason } => {
                    tracing::warn!(reason = %reason, "symbol skipped");
                }
                other => tracing::debug!(outcome = %other, "symbol done"),
            }
            outcomes.push((symbol.clone(), outcome));
        }

        let report = CycleReport {
            cycle,
            ranked,
            outcomes,
        };
        tracing::info!(
            symbols = report.outcomes.len(),
            orders = report.orders_placed(),
            skipped = report.skipped(),
            failed = report.failures(),
            "cycle complete"
        );
        report
    }

    /// Run cycles back to back with `cycle_interval` between them.
    ///
    /// `max_cycles == None` runs until the process is stopped. Returns the
    /// number of cycles completed.
    pub fn run(&self, max_cycles: Option<u64>) -> u64 {
        if max_cycles == Some(0) {
            return 0;
        }
        let mut completed = 0u64;
        loop {
            self.run_once(completed + 1);
            completed += 1;
            if max_cycles.is_some_and(|max| completed >= max) {
                return completed;
            }
            tracing::info!(
                interval_secs = self.config.cycle_interval.as_secs_f64(),
                "waiting for next cycle"
            );
            self.sleeper.sleep(self.config.cycle_interval);
        }
    }
}
