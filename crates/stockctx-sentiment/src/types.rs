use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classifier output label for a single text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawSentiment {
    Negative,
    Neutral,
    Positive,
}

impl RawSentiment {
    pub const ALL: [Self; 3] = [Self::Negative, Self::Neutral, Self::Positive];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            "positive" => Some(Self::Positive),
            _ => None,
        }
    }
}

impl fmt::Display for RawSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticker-level verdict after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentVerdict {
    Bearish,
    Neutral,
    Bullish,
}

impl fmt::Display for SentimentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
            Self::Bullish => "bullish",
        })
    }
}

/// Probability per label. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

/// A scorer's verdict on one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: RawSentiment,
    /// Confidence in `label`, in `[0, 1]`.
    pub score: f64,
    pub scores: LabelScores,
}

impl SentimentScore {
    /// `positive - negative`, in `[-1, 1]`.
    #[must_use]
    pub fn net_score(&self) -> f64 {
        self.scores.positive - self.scores.negative
    }
}

/// Aggregation input.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub label: RawSentiment,
    pub confidence: f64,
    /// ISO-8601 timestamp; anything unparseable or without an offset gets
    /// the neutral recency weight.
    pub timestamp: Option<String>,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSentiment {
    pub score: f64,
    pub label: SentimentVerdict,
    pub confidence: f64,
    pub post_count: usize,
    pub included_count: usize,
    /// Raw label counts, including low-confidence documents.
    pub distribution: BTreeMap<RawSentiment, usize>,
}

/// A social media post normalised across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    /// `"{platform}_{native id}"`.
    pub id: String,
    pub platform: String,
    pub ticker: String,
    pub content: String,
    pub author: String,
    pub timestamp: Option<String>,
    pub likes: u64,
    pub comments: u64,
    pub engagement_score: u64,
    pub url: String,
    /// Label the platform itself attached, if any (e.g. StockTwits "Bullish").
    pub platform_sentiment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Engagement {
    pub likes: u64,
    pub comments: u64,
    pub score: u64,
}

/// A scored post as reported back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: String,
    pub platform: String,
    pub content: String,
    pub author: String,
    pub timestamp: Option<String>,
    pub sentiment: SentimentScore,
    /// The author's own Bullish/Bearish tag, where the platform has one.
    pub platform_sentiment: Option<String>,
    pub engagement: Engagement,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerAnalysis {
    pub ticker: String,
    pub aggregate: AggregateSentiment,
    pub sources: BTreeMap<String, usize>,
    pub posts: Vec<PostView>,
    pub scraped: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub ticker: String,
    pub aggregate_score: f64,
    pub label: SentimentVerdict,
    pub confidence: f64,
    pub post_count: usize,
    pub last_updated: Option<String>,
}
