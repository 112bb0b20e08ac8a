//! Alpaca REST adapter: market data, brokerage and news.
//!
//! Uses the blocking reqwest client; every method is one HTTP request and
//! retries are left to the caller. Transport failures, 408/429 and 5xx map to
//! transient errors, other 4xx responses to [`TraderError::RequestRejected`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::config_validation::{KEY_ID_ENV, SECRET_KEY_ENV, credential};
use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::position::{Position, Side};
use crate::domain::timeframe::Timeframe;
use crate::ports::broker_port::{BrokerPort, OrderAck, OrderRequest};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::sentiment_port::TextSource;

pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const DATA_BASE_URL: &str = "https://data.alpaca.markets";

#[derive(Debug, Clone, PartialEq)]
pub struct AlpacaSettings {
    pub key_id: String,
    pub secret_key: String,
    pub base_url: String,
    pub data_url: String,
    pub timeout: Duration,
    /// Data feed (`iex`, `sip`); the account default when unset.
    pub feed: Option<String>,
    pub news_limit: usize,
}

impl AlpacaSettings {
    pub fn from_config(
        config: &dyn ConfigPort,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, TraderError> {
        let key_id = credential(config, "key_id", KEY_ID_ENV, env).ok_or_else(|| {
            TraderError::ConfigMissing {
                section: "alpaca".to_string(),
                key: "key_id".to_string(),
            }
        })?;
        let secret_key = credential(config, "secret_key", SECRET_KEY_ENV, env).ok_or_else(|| {
            TraderError::ConfigMissing {
                section: "alpaca".to_string(),
                key: "secret_key".to_string(),
            }
        })?;
        let url = |key: &str, default: &str| {
            config
                .get_string("alpaca", key)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
                .trim()
                .trim_end_matches('/')
                .to_string()
        };

        Ok(Self {
            key_id,
            secret_key,
            base_url: url("base_url", PAPER_BASE_URL),
            data_url: url("data_url", DATA_BASE_URL),
            timeout: Duration::from_secs(config.get_int("alpaca", "timeout_secs", 30).max(1) as u64),
            feed: config
                .get_string("alpaca", "feed")
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            news_limit: config.get_int("sentiment", "max_texts", 20).clamp(1, 50) as usize,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BarsBody {
    bars: Option<Vec<BarBody>>,
}

#[derive(Debug, Deserialize)]
struct BarBody {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct LatestTradeBody {
    trade: TradeBody,
}

#[derive(Debug, Deserialize)]
struct TradeBody {
    p: f64,
}

/// Alpaca sends numeric position fields as strings.
#[derive(Debug, Deserialize)]
struct PositionBody {
    symbol: String,
    qty: String,
    side: String,
    avg_entry_price: String,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    symbol: &'a str,
    qty: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    client_order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderAckBody {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct NewsBody {
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    headline: String,
    #[serde(default)]
    summary: String,
}

fn market_data_error(reason: String) -> TraderError {
    TraderError::MarketData { reason }
}

fn broker_error(reason: String) -> TraderError {
    TraderError::Broker { reason }
}

fn sentiment_error(reason: String) -> TraderError {
    TraderError::Sentiment { reason }
}

fn bars_from_body(body: BarsBody) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = body
        .bars
        .unwrap_or_default()
        .into_iter()
        .map(|b| PriceBar {
            timestamp: b.t,
            open: b.o,
            high: b.h,
            low: b.l,
            close: b.c,
            volume: b.v,
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

fn position_from_body(body: PositionBody) -> Result<Position, TraderError> {
    let invalid = |reason: String| TraderError::InvalidPosition {
        symbol: body.symbol.clone(),
        reason,
    };
    let qty: f64 = body
        .qty
        .trim()
        .parse()
        .map_err(|_| invalid(format!("unparseable qty {:?}", body.qty)))?;
    let avg_entry_price: f64 = body
        .avg_entry_price
        .trim()
        .parse()
        .map_err(|_| invalid(format!("unparseable avg_entry_price {:?}", body.avg_entry_price)))?;
    let side = match body.side.trim().to_lowercase().as_str() {
        "long" => Side::Long,
        "short" => Side::Short,
        other => return Err(invalid(format!("unknown side {:?}", other))),
    };

    let position = Position {
        symbol: body.symbol.clone(),
        side,
        quantity: qty.abs(),
        avg_entry_price,
    };
    position.validate()?;
    Ok(position)
}

fn news_texts(body: NewsBody) -> Vec<String> {
    body.news
        .into_iter()
        .map(|item| {
            let summary = item.summary.trim();
            if summary.is_empty() {
                item.headline
            } else {
                format!("{}. {}", item.headline.trim_end_matches('.'), summary)
            }
        })
        .collect()
}

/// Alpaca answers a reused `client_order_id` with 422 and a message naming
/// the field; the earlier order stands.
fn is_duplicate_client_order_id(err: &TraderError) -> bool {
    match err {
        TraderError::RequestRejected {
            status: 422,
            reason,
            ..
        } => reason.to_lowercase().contains("client_order_id"),
        _ => false,
    }
}

fn order_body(order: &OrderRequest) -> OrderBody<'_> {
    OrderBody {
        symbol: &order.symbol,
        qty: format_quantity(order.quantity),
        side: order.side.as_str(),
        order_type: "market",
        time_in_force: order.time_in_force.as_str(),
        client_order_id: &order.client_order_id,
    }
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as u64)
    } else {
        format!("{}", quantity)
    }
}

pub struct AlpacaAdapter {
    client: Client,
    settings: AlpacaSettings,
}

impl AlpacaAdapter {
    pub fn new(settings: AlpacaSettings) -> Result<Self, TraderError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TraderError::Io {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, settings })
    }

    pub fn from_config(
        config: &dyn ConfigPort,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, TraderError> {
        Self::new(AlpacaSettings::from_config(config, env)?)
    }

    fn execute(
        &self,
        request: RequestBuilder,
        operation: &str,
        fail: fn(String) -> TraderError,
    ) -> Result<Response, TraderError> {
        let response = request
            .header("APCA-API-KEY-ID", &self.settings.key_id)
            .header("APCA-API-SECRET-KEY", &self.settings.secret_key)
            .send()
            .map_err(|e| fail(format!("{operation}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), body = %body, "alpaca request failed");
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            return Err(fail(format!("{operation}: http {}: {}", status.as_u16(), body)));
        }
        Err(TraderError::RequestRejected {
            operation: operation.to_string(),
            status: status.as_u16(),
            reason: body,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &str,
        fail: fn(String) -> TraderError,
    ) -> Result<T, TraderError> {
        self.execute(self.client.get(url).query(query), operation, fail)?
            .json::<T>()
            .map_err(|e| fail(format!("{operation}: invalid response body: {e}")))
    }
}

impl MarketDataPort for AlpacaAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        // Requesting newest-first from a start far enough back to cover
        // nights and weekends returns the most recent `limit` bars.
        let span = timeframe
            .step()
            .saturating_mul((limit.max(1) as u32).saturating_mul(4))
            .max(Duration::from_secs(7 * 24 * 60 * 60));
        let start = Utc::now() - chrono::Duration::seconds(span.as_secs() as i64);

        let mut query = vec![
            ("timeframe", timeframe.label().to_string()),
            ("limit", limit.to_string()),
            ("sort", "desc".to_string()),
            ("start", start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        ];
        if let Some(feed) = &self.settings.feed {
            query.push(("feed", feed.clone()));
        }

        let url = format!("{}/v2/stocks/{}/bars", self.settings.data_url, symbol);
        let body: BarsBody = self.get_json(&url, &query, "fetch_bars", market_data_error)?;
        Ok(bars_from_body(body))
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        let url = format!("{}/v2/stocks/{}/trades/latest", self.settings.data_url, symbol);
        let query: Vec<(&str, String)> = self
            .settings
            .feed
            .iter()
            .map(|feed| ("feed", feed.clone()))
            .collect();
        let body: LatestTradeBody =
            self.get_json(&url, &query, "latest_price", market_data_error)?;
        Ok(body.trade.p)
    }
}

impl BrokerPort for AlpacaAdapter {
    fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, TraderError> {
        let url = format!("{}/v2/positions/{}", self.settings.base_url, symbol);
        match self.get_json::<PositionBody>(&url, &[], "fetch_position", broker_error) {
            Ok(body) => position_from_body(body).map(Some),
            Err(TraderError::RequestRejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn submit_market_order(&self, order: &OrderRequest) -> Result<OrderAck, TraderError> {
        let url = format!("{}/v2/orders", self.settings.base_url);
        let submitted = self
            .execute(
                self.client.post(&url).json(&order_body(order)),
                "submit_order",
                broker_error,
            )
            .and_then(|response| {
                response.json::<OrderAckBody>().map_err(|e| {
                    broker_error(format!("submit_order: invalid response body: {e}"))
                })
            });

        let ack = match submitted {
            Ok(ack) => ack,
            Err(err) if is_duplicate_client_order_id(&err) => {
                tracing::info!(
                    client_order_id = %order.client_order_id,
                    "order already submitted, fetching it"
                );
                let url = format!("{}/v2/orders:by_client_order_id", self.settings.base_url);
                self.get_json(
                    &url,
                    &[("client_order_id", order.client_order_id.clone())],
                    "fetch_order",
                    broker_error,
                )?
            }
            Err(err) => return Err(err),
        };
        Ok(OrderAck {
            order_id: ack.id,
            status: ack.status,
        })
    }
}

impl TextSource for AlpacaAdapter {
    fn search(&self, symbol: &str) -> Result<Vec<String>, TraderError> {
        let url = format!("{}/v1beta1/news", self.settings.data_url);
        let query = [
            ("symbols", symbol.to_string()),
            ("limit", self.settings.news_limit.to_string()),
        ];
        let body: NewsBody = self.get_json(&url, &query, "search_news", sentiment_error)?;
        Ok(news_texts(body))
    }
}
