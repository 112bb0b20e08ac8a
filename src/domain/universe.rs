//! Symbol universe parsing and worst-performer ranking.
//!
//! The ranker narrows the configured universe to the symbols that fell the
//! most over the ranking window, which the short-side strategy trades.

use std::collections::HashSet;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("malformed symbol: {0:?}")]
    Malformed(String),
}

/// Ticker check applied before any external call for `symbol` is made.
pub fn validate_symbol(symbol: &str) -> Result<(), TraderError> {
    let ok = !symbol.is_empty()
        && symbol.len() <= 12
        && symbol.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '/' | '-'));
    if ok {
        Ok(())
    } else {
        Err(TraderError::InvalidSymbol {
            symbol: symbol.to_string(),
        })
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if validate_symbol(&symbol).is_err() {
            return Err(UniverseError::Malformed(trimmed.to_string()));
        }
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRank {
    pub symbol: String,
    pub performance_pct: f64,
}

/// `(last_close - first_close) / first_close`, or `None` when the window is
/// too short or the first close is not a usable divisor.
pub fn performance(bars: &[PriceBar], min_bars: usize) -> Option<f64> {
    if bars.len() < min_bars.max(2) {
        return None;
    }
    let first = bars.first()?.close;
    let last = bars.last()?.close;
    if !(first.is_finite() && first > 0.0 && last.is_finite()) {
        return None;
    }
    Some((last - first) / first)
}

/// Rank ascending by performance (worst first) and keep the first `count`.
///
/// Symbols without a usable series are left out rather than ranked last.
/// Ties keep input order.
pub fn rank_worst_performers(
    candidates: &[(String, Option<Vec<PriceBar>>)],
    min_bars: usize,
    count: usize,
) -> Vec<SymbolRank> {
    let mut ranks: Vec<SymbolRank> = candidates
        .iter()
        .filter_map(|(symbol, bars)| {
            let pct = performance(bars.as_deref()?, min_bars)?;
            Some(SymbolRank {
                symbol: symbol.clone(),
                performance_pct: pct,
            })
        })
        .collect();

    // sort_by is stable, which keeps ties in input order.
    ranks.sort_by(|a, b| a.performance_pct.total_cmp(&b.performance_pct));
    ranks.truncate(count);
    ranks
}
