//! Sentiment scoring and text source port traits.

use crate::domain::error::TraderError;

pub trait SentimentScorer {
    /// Compound polarity in `[-1, 1]`.
    fn score(&self, text: &str) -> f64;
}

pub trait TextSource {
    /// Recent texts (headlines, posts) mentioning `symbol`.
    fn search(&self, symbol: &str) -> Result<Vec<String>, TraderError>;
}
