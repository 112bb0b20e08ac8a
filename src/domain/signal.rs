//! Discrete trading signals and the policy that merges them.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Short,
    Cover,
    None,
}

impl Signal {
    pub fn is_none(&self) -> bool {
        matches!(self, Signal::None)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Short => "short",
            Signal::Cover => "cover",
            Signal::None => "none",
        };
        f.write_str(s)
    }
}

/// How technical and sentiment signals are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinePolicy {
    /// A non-`None` sentiment signal replaces the technical one outright.
    /// This is an override, not a vote: one noisy sentiment reading can
    /// cancel a strong technical signal.
    #[default]
    SentimentOverride,
    /// Sentiment is ignored.
    TechnicalOnly,
}

impl FromStr for CombinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentiment_override" => Ok(CombinePolicy::SentimentOverride),
            "technical_only" => Ok(CombinePolicy::TechnicalOnly),
            other => Err(format!(
                "unknown combine policy {other:?} (expected sentiment_override or technical_only)"
            )),
        }
    }
}

impl fmt::Display for CombinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinePolicy::SentimentOverride => f.write_str("sentiment_override"),
            CombinePolicy::TechnicalOnly => f.write_str("technical_only"),
        }
    }
}

pub fn combine(policy: CombinePolicy, technical: Signal, sentiment: Signal) -> Signal {
    match policy {
        CombinePolicy::SentimentOverride if !sentiment.is_none() => sentiment,
        _ => technical,
    }
}
