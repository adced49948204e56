//! Social sentiment for stock tickers.
//!
//! Collects posts from social platforms, scores each one, stores them in the
//! shared vector index, and aggregates the scores into a ticker-level verdict.

pub mod aggregate;
pub mod error;
pub mod pipeline;
pub mod scorer;
pub mod sources;
pub mod types;

pub use aggregate::{recency_weight, SentimentAggregator};
pub use error::SentimentError;
pub use pipeline::{SentimentService, SENTIMENT_NAMESPACE, SOCIAL_POST_DOC_TYPE};
pub use scorer::{lexicon_score, LexiconScorer, SentimentScorer};
pub use sources::{collect_posts, source_counts, PostCollector, StockTwitsCollector};
pub use types::{
    AggregateSentiment, Engagement, LabelScores, PostView, RawSentiment, ScoredDocument,
    SentimentScore, SentimentSummary, SentimentVerdict, SocialPost, TickerAnalysis,
};
