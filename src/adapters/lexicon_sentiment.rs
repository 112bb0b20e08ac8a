//! Lexicon-based sentiment scorer for financial headlines.
//!
//! Each known word contributes a valence; a negation within the three
//! preceding words flips and dampens it, and a booster word scales it. The
//! summed valence is squashed to `[-1, 1]` with `x / sqrt(x² + 15)`.

use std::collections::HashMap;

use crate::ports::sentiment_port::SentimentScorer;

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCREMENT: f64 = 0.293;
const NEGATION_WINDOW: usize = 3;

const POSITIVE: &[(&str, f64)] = &[
    ("gain", 2.0),
    ("gains", 2.0),
    ("surge", 2.6),
    ("surges", 2.6),
    ("soar", 2.8),
    ("soars", 2.8),
    ("rally", 2.3),
    ("rallies", 2.3),
    ("beat", 1.8),
    ("beats", 1.8),
    ("record", 1.5),
    ("growth", 1.9),
    ("profit", 1.9),
    ("profits", 1.9),
    ("upgrade", 2.2),
    ("upgraded", 2.2),
    ("bullish", 2.5),
    ("strong", 1.8),
    ("outperform", 2.1),
    ("rise", 1.6),
    ("rises", 1.6),
    ("jump", 1.9),
    ("jumps", 1.9),
    ("buy", 1.4),
    ("good", 1.9),
    ("great", 3.1),
    ("positive", 2.3),
    ("win", 2.8),
    ("wins", 2.8),
    ("boost", 1.7),
    ("optimistic", 2.3),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("loss", -2.1),
    ("losses", -2.1),
    ("plunge", -2.7),
    ("plunges", -2.7),
    ("crash", -3.0),
    ("crashes", -3.0),
    ("fall", -1.6),
    ("falls", -1.6),
    ("drop", -1.7),
    ("drops", -1.7),
    ("miss", -1.8),
    ("misses", -1.8),
    ("downgrade", -2.2),
    ("downgraded", -2.2),
    ("bearish", -2.5),
    ("weak", -1.9),
    ("lawsuit", -2.0),
    ("fraud", -3.2),
    ("bankruptcy", -3.3),
    ("recall", -1.6),
    ("sell", -1.2),
    ("slump", -2.2),
    ("slumps", -2.2),
    ("decline", -1.7),
    ("declines", -1.7),
    ("bad", -2.5),
    ("negative", -2.3),
    ("fear", -2.2),
    ("fears", -2.2),
    ("warning", -1.8),
    ("underperform", -2.1),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "without", "nor", "neither", "isn't", "aren't", "wasn't", "won't",
    "don't", "doesn't", "didn't", "can't", "cannot",
];

const BOOSTERS: &[&str] = &[
    "very",
    "extremely",
    "sharply",
    "strongly",
    "significantly",
    "hugely",
    "massively",
];

pub struct LexiconScorer {
    lexicon: HashMap<&'static str, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        let lexicon = POSITIVE.iter().chain(NEGATIVE).copied().collect();
        Self { lexicon }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    /// Unnormalised valence sum.
    pub fn raw_valence(&self, text: &str) -> f64 {
        let tokens = Self::tokens(text);
        let mut total = 0.0;

        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.lexicon.get(token.as_str()) else {
                continue;
            };
            let mut valence = base;

            if i > 0 && BOOSTERS.contains(&tokens[i - 1].as_str()) {
                valence += BOOSTER_INCREMENT * valence.signum();
            }
            let window = &tokens[i.saturating_sub(NEGATION_WINDOW)..i];
            if window
                .iter()
                .any(|t| NEGATIONS.contains(&t.as_str()) || t.ends_with("n't"))
            {
                valence *= NEGATION_SCALAR;
            }
            total += valence;
        }
        total
    }
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        normalize(self.raw_valence(text))
    }
}
