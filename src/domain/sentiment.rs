//! Sentiment score to signal mapping.

use crate::domain::signal::Signal;

/// Scores with a smaller magnitude are treated as noise.
pub const SENTIMENT_NOISE_FLOOR: f64 = 0.2;
/// Minimum magnitude for a directional signal.
pub const SENTIMENT_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentThresholds {
    pub noise_floor: f64,
    pub threshold: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            noise_floor: SENTIMENT_NOISE_FLOOR,
            threshold: SENTIMENT_THRESHOLD,
        }
    }
}

impl SentimentThresholds {
    pub fn signal(&self, score: f64) -> Signal {
        if !score.is_finite() || score.abs() < self.noise_floor {
            return Signal::None;
        }
        if score >= self.threshold {
            Signal::Buy
        } else if score <= -self.threshold {
            Signal::Sell
        } else {
            Signal::None
        }
    }
}

/// Mean of the finite scores, or `None` if there are none.
pub fn aggregate_scores(scores: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}
