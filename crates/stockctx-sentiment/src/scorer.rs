//! Text sentiment scoring.
//!
//! [`SentimentScorer`] is the seam for a trained classifier. The bundled
//! [`LexiconScorer`] sums hand-picked market-language word weights and maps the
//! result onto the same three-label probability shape a classifier returns.

use crate::types::{LabelScores, RawSentiment, SentimentScore};

/// Texts whose summed lexicon weight stays inside `(-NEUTRAL_BAND, NEUTRAL_BAND)`
/// are labelled neutral.
const NEUTRAL_BAND: f64 = 0.3;

/// Market-language word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The summed score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f64)] = &[
    // Positive signals
    ("bullish", 0.6),
    ("beat", 0.4),
    ("beats", 0.4),
    ("breakout", 0.4),
    ("buy", 0.3),
    ("buying", 0.3),
    ("calls", 0.2),
    ("gain", 0.3),
    ("gains", 0.3),
    ("growth", 0.3),
    ("higher", 0.2),
    ("long", 0.2),
    ("moon", 0.4),
    ("outperform", 0.4),
    ("profit", 0.3),
    ("rally", 0.4),
    ("record", 0.3),
    ("soar", 0.5),
    ("soaring", 0.5),
    ("strong", 0.3),
    ("surge", 0.5),
    ("upgrade", 0.5),
    ("upgraded", 0.5),
    // Negative signals
    ("bearish", -0.6),
    ("bankruptcy", -0.8),
    ("crash", -0.6),
    ("downgrade", -0.5),
    ("downgraded", -0.5),
    ("drop", -0.3),
    ("dump", -0.4),
    ("fraud", -0.7),
    ("layoffs", -0.4),
    ("lawsuit", -0.5),
    ("loss", -0.3),
    ("losses", -0.3),
    ("lower", -0.2),
    ("miss", -0.4),
    ("missed", -0.4),
    ("plunge", -0.5),
    ("puts", -0.2),
    ("recall", -0.5),
    ("sell", -0.3),
    ("selling", -0.3),
    ("underperform", -0.4),
    ("weak", -0.3),
];

pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> SentimentScore;

    fn score_batch(&self, texts: &[&str]) -> Vec<SentimentScore> {
        texts.iter().map(|t| self.score(t)).collect()
    }
}

/// Score a text with the market lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps the
/// result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> SentimentScore {
        if text.trim().is_empty() {
            return SentimentScore {
                label: RawSentiment::Neutral,
                score: 1.0,
                scores: LabelScores {
                    negative: 0.0,
                    neutral: 1.0,
                    positive: 0.0,
                },
            };
        }

        let raw = lexicon_score(text);
        let polarity = raw.abs();
        let (label, confidence) = if polarity < NEUTRAL_BAND {
            (RawSentiment::Neutral, 1.0 - polarity)
        } else if raw > 0.0 {
            (RawSentiment::Positive, 0.5 + polarity / 2.0)
        } else {
            (RawSentiment::Negative, 0.5 + polarity / 2.0)
        };

        let remainder = 1.0 - confidence;
        let scores = match label {
            RawSentiment::Neutral if raw > 0.0 => LabelScores {
                negative: 0.0,
                neutral: confidence,
                positive: remainder,
            },
            RawSentiment::Neutral => LabelScores {
                negative: remainder,
                neutral: confidence,
                positive: 0.0,
            },
            RawSentiment::Positive => LabelScores {
                negative: 0.0,
                neutral: remainder,
                positive: confidence,
            },
            RawSentiment::Negative => LabelScores {
                negative: confidence,
                neutral: remainder,
                positive: 0.0,
            },
        };

        SentimentScore {
            label,
            score: confidence,
            scores,
        }
    }
}
