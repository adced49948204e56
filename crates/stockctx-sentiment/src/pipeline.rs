//! Sentiment pipeline orchestration.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use stockctx_index::{DocumentDraft, DocumentRecord};
use stockctx_rag::{
    IngestPool, PreparedDocument, RetrievalFilter, RetrievalService, RetrievedContext,
};

use crate::aggregate::SentimentAggregator;
use crate::error::SentimentError;
use crate::scorer::SentimentScorer;
use crate::sources::{collect_posts, source_counts, PostCollector};
use crate::types::{
    Engagement, PostView, RawSentiment, ScoredDocument, SentimentScore, SentimentSummary,
    SentimentVerdict, SocialPost, TickerAnalysis,
};

pub const SENTIMENT_NAMESPACE: &str = "sentiment";
pub const SOCIAL_POST_DOC_TYPE: &str = "social_post";

const DEFAULT_MAX_POSTS_PER_PLATFORM: usize = 30;
const SUMMARY_RETRIEVAL_LIMIT: usize = 100;
const REPORTED_POSTS: usize = 50;
const STORED_CONTENT_CHARS: usize = 500;
const PREVIEW_CHARS: usize = 200;
/// Confidence assumed for stored posts that predate score tracking.
const DEFAULT_STORED_CONFIDENCE: f64 = 0.5;

struct ScoredPost {
    post: SocialPost,
    sentiment: SentimentScore,
}

pub struct SentimentService {
    collectors: Vec<Arc<dyn PostCollector>>,
    scorer: Arc<dyn SentimentScorer>,
    aggregator: SentimentAggregator,
    pool: Arc<IngestPool>,
    retrieval: Arc<RetrievalService>,
    max_posts_per_platform: usize,
}

impl SentimentService {
    #[must_use]
    pub fn new(
        pool: Arc<IngestPool>,
        retrieval: Arc<RetrievalService>,
        scorer: Arc<dyn SentimentScorer>,
    ) -> Self {
        Self {
            collectors: Vec::new(),
            scorer,
            aggregator: SentimentAggregator::default(),
            pool,
            retrieval,
            max_posts_per_platform: DEFAULT_MAX_POSTS_PER_PLATFORM,
        }
    }

    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn PostCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    #[must_use]
    pub fn with_aggregator(mut self, aggregator: SentimentAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    #[must_use]
    pub fn with_max_posts_per_platform(mut self, max: usize) -> Self {
        self.max_posts_per_platform = max;
        self
    }

    /// Collect, score, index, and aggregate fresh posts for `ticker`.
    ///
    /// Collector and embedding failures are logged and counted; they never
    /// fail the analysis. No posts at all yields a neutral zero report.
    pub async fn analyze_ticker(&self, ticker: &str) -> TickerAnalysis {
        let ticker = ticker.to_uppercase();
        tracing::info!(ticker = %ticker, "starting sentiment analysis");

        let platforms: Vec<&str> = self.collectors.iter().map(|c| c.platform()).collect();
        let posts = collect_posts(&self.collectors, &ticker, self.max_posts_per_platform).await;

        if posts.is_empty() {
            tracing::warn!(ticker = %ticker, "no social posts found");
            return TickerAnalysis {
                aggregate: self.aggregator.compute(&[]),
                sources: source_counts(&platforms, &[]),
                ticker,
                posts: Vec::new(),
                scraped: 0,
                embedded: 0,
                skipped: 0,
                failed: 0,
            };
        }

        let texts: Vec<&str> = posts.iter().map(|p| p.content.as_str()).collect();
        let sentiments = self.scorer.score_batch(&texts);
        let sources = source_counts(&platforms, &posts);
        let mut scored: Vec<ScoredPost> = posts
            .into_iter()
            .zip(sentiments)
            .map(|(post, sentiment)| ScoredPost { post, sentiment })
            .collect();

        let documents: Vec<PreparedDocument> = scored
            .iter()
            .map(|s| PreparedDocument(post_draft(&ticker, s)))
            .collect();
        let stats = self.pool.run_batch(documents).await;

        let inputs: Vec<ScoredDocument> = scored.iter().map(scored_document).collect();
        let aggregate = self.aggregator.compute(&inputs);

        scored.sort_by_key(|s| {
            Reverse((s.post.engagement_score, s.post.timestamp.clone()))
        });
        let reported = scored.iter().take(REPORTED_POSTS).map(post_view).collect();

        tracing::info!(
            ticker = %ticker,
            label = %aggregate.label,
            score = aggregate.score,
            "sentiment analysis complete"
        );

        TickerAnalysis {
            scraped: scored.len(),
            ticker,
            aggregate,
            sources,
            posts: reported,
            embedded: stats.embedded,
            skipped: stats.skipped,
            failed: stats.failed,
        }
    }

    /// Aggregate the posts already stored for `ticker`, without collecting.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::Retrieval`] if the lookup query cannot be
    /// embedded or does not fit the index.
    pub async fn summary(&self, ticker: &str) -> Result<SentimentSummary, SentimentError> {
        let ticker = ticker.to_uppercase();
        let filter = RetrievalFilter::namespace(SENTIMENT_NAMESPACE).with_ticker(ticker.clone());
        let matches = self
            .retrieval
            .try_retrieve_context(
                &format!("{ticker} stock sentiment"),
                &filter,
                SUMMARY_RETRIEVAL_LIMIT,
            )
            .await?;

        if matches.is_empty() {
            return Ok(SentimentSummary {
                ticker,
                aggregate_score: 0.0,
                label: SentimentVerdict::Neutral,
                confidence: 0.0,
                post_count: 0,
                last_updated: None,
            });
        }

        let documents: Vec<ScoredDocument> = matches
            .iter()
            .map(|m| stored_document(&m.metadata))
            .collect();
        let last_updated = documents
            .iter()
            .filter_map(|d| d.timestamp.as_deref())
            .max()
            .map(str::to_string);
        let aggregate = self.aggregator.compute(&documents);

        Ok(SentimentSummary {
            ticker,
            aggregate_score: aggregate.score,
            label: aggregate.label,
            confidence: aggregate.confidence,
            post_count: documents.len(),
            last_updated,
        })
    }

    /// Stored posts for `ticker` most similar to `query`.
    pub async fn sentiment_context(
        &self,
        query: &str,
        ticker: &str,
        k: usize,
    ) -> Vec<RetrievedContext> {
        let filter =
            RetrievalFilter::namespace(SENTIMENT_NAMESPACE).with_ticker(ticker.to_uppercase());
        self.retrieval.retrieve_context(query, &filter, k).await
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn post_draft(ticker: &str, scored: &ScoredPost) -> DocumentDraft {
    let post = &scored.post;
    let attributes: BTreeMap<String, Value> = [
        ("platform", Value::from(post.platform.as_str())),
        ("content", Value::from(truncate_chars(&post.content, STORED_CONTENT_CHARS))),
        ("content_preview", Value::from(truncate_chars(&post.content, PREVIEW_CHARS))),
        ("author", Value::from(post.author.as_str())),
        ("timestamp", Value::from(post.timestamp.clone().unwrap_or_default())),
        ("likes", Value::from(post.likes)),
        ("comments", Value::from(post.comments)),
        ("engagement_score", Value::from(post.engagement_score)),
        ("sentiment_label", Value::from(scored.sentiment.label.as_str())),
        ("sentiment_score", Value::from(scored.sentiment.score)),
        ("platform_sentiment", Value::from(post.platform_sentiment.clone())),
        ("url", Value::from(post.url.as_str())),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    DocumentDraft {
        namespace: SENTIMENT_NAMESPACE.to_string(),
        external_id: post.id.clone(),
        ticker: ticker.to_string(),
        doc_type: SOCIAL_POST_DOC_TYPE.to_string(),
        attributes,
        full_text: post.content.clone(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn scored_document(scored: &ScoredPost) -> ScoredDocument {
    ScoredDocument {
        label: scored.sentiment.label,
        confidence: scored.sentiment.score,
        timestamp: scored.post.timestamp.clone(),
        engagement_score: scored.post.engagement_score as f64,
    }
}

/// Rebuild aggregation input from a stored post. A missing label counts as
/// neutral and a missing score as [`DEFAULT_STORED_CONFIDENCE`].
fn stored_document(record: &DocumentRecord) -> ScoredDocument {
    let attr = |key: &str| record.attributes.get(key);
    ScoredDocument {
        label: attr("sentiment_label")
            .and_then(Value::as_str)
            .and_then(RawSentiment::from_label)
            .unwrap_or(RawSentiment::Neutral),
        confidence: attr("sentiment_score")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_STORED_CONFIDENCE),
        timestamp: attr("timestamp")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        engagement_score: attr("engagement_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    }
}

fn post_view(scored: &ScoredPost) -> PostView {
    let post = &scored.post;
    PostView {
        id: post.id.clone(),
        platform: post.platform.clone(),
        content: truncate_chars(&post.content, STORED_CONTENT_CHARS),
        author: post.author.clone(),
        timestamp: post.timestamp.clone(),
        sentiment: scored.sentiment,
        platform_sentiment: post.platform_sentiment.clone(),
        engagement: Engagement {
            likes: post.likes,
            comments: post.comments,
            score: post.engagement_score,
        },
        url: post.url.clone(),
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
