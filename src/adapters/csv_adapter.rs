//! CSV file market data adapter for offline and dry runs.
//!
//! Reads `{dir}/{SYMBOL}.csv` with a `timestamp,open,high,low,close,volume`
//! header and RFC 3339 timestamps.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.csv", symbol.replace('/', "_")))
    }

    /// All bars in the file, oldest first. A missing file is an empty history.
    fn read_bars(&self, symbol: &str) -> Result<Vec<PriceBar>, TraderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no CSV file for symbol");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(TraderError::Io {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TraderError::MalformedData {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| TraderError::MalformedData {
                reason: format!("missing timestamp column on row {}", line + 1),
            })?;
            let timestamp = DateTime::parse_from_rfc3339(ts_str.trim())
                .map_err(|e| TraderError::MalformedData {
                    reason: format!("invalid timestamp {:?}: {}", ts_str, e),
                })?
                .with_timezone(&Utc);

            let field = |index: usize, name: &str| -> Result<f64, TraderError> {
                record
                    .get(index)
                    .ok_or_else(|| TraderError::MalformedData {
                        reason: format!("missing {} column on row {}", name, line + 1),
                    })?
                    .trim()
                    .parse()
                    .map_err(|e| TraderError::MalformedData {
                        reason: format!("invalid {} value on row {}: {}", name, line + 1, e),
                    })
            };

            bars.push(PriceBar {
                timestamp,
                open: field(1, "open")?,
                high: field(2, "high")?,
                low: field(3, "low")?,
                close: field(4, "close")?,
                volume: field(5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

impl MarketDataPort for CsvAdapter {
    /// The file is assumed to already hold bars at `timeframe`; no resampling is done.
    fn fetch_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        let mut bars = self.read_bars(symbol)?;
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(bars)
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        self.read_bars(symbol)?
            .last()
            .map(|b| b.close)
            .ok_or_else(|| TraderError::MarketData {
                reason: format!("no price data for {}", symbol),
            })
    }
}
