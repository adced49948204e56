//! Social post collectors.

mod stocktwits;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SentimentError;
use crate::types::SocialPost;

pub use stocktwits::StockTwitsCollector;

#[async_trait]
pub trait PostCollector: Send + Sync {
    /// Platform name stamped on every post this collector returns.
    fn platform(&self) -> &str;

    /// Fetch up to `limit` recent posts mentioning `ticker`.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError`] if the platform cannot be reached or
    /// answers with an error.
    async fn collect(&self, ticker: &str, limit: usize)
        -> Result<Vec<SocialPost>, SentimentError>;
}

/// Run every collector in turn and merge their posts.
///
/// A failing collector is logged and contributes nothing. Posts whose id was
/// already seen are dropped.
pub async fn collect_posts(
    collectors: &[Arc<dyn PostCollector>],
    ticker: &str,
    limit_per_platform: usize,
) -> Vec<SocialPost> {
    let mut posts = Vec::new();
    let mut seen = HashSet::new();

    for collector in collectors {
        match collector.collect(ticker, limit_per_platform).await {
            Ok(batch) => {
                tracing::debug!(
                    ticker,
                    source = collector.platform(),
                    count = batch.len(),
                    "collected posts"
                );
                posts.extend(batch.into_iter().filter(|p| seen.insert(p.id.clone())));
            }
            Err(e) => {
                tracing::warn!(
                    ticker,
                    source = collector.platform(),
                    error = %e,
                    "post collection failed"
                );
            }
        }
    }

    posts
}

/// Post count per platform. Every name in `platforms` is present, with zero
/// if it produced nothing.
#[must_use]
pub fn source_counts(platforms: &[&str], posts: &[SocialPost]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> =
        platforms.iter().map(|p| ((*p).to_string(), 0)).collect();
    for post in posts {
        *counts.entry(post.platform.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn post(platform: &str, native_id: &str) -> SocialPost {
        SocialPost {
            id: format!("{platform}_{native_id}"),
            platform: platform.to_string(),
            ticker: "NVDA".to_string(),
            content: format!("post {native_id}"),
            author: "trader".to_string(),
            timestamp: None,
            likes: 0,
            comments: 0,
            engagement_score: 0,
            url: String::new(),
            platform_sentiment: None,
        }
    }

    pub(crate) struct FixedCollector {
        pub(crate) platform: &'static str,
        pub(crate) posts: Option<Vec<SocialPost>>,
    }

    #[async_trait]
    impl PostCollector for FixedCollector {
        fn platform(&self) -> &str {
            self.platform
        }

        async fn collect(
            &self,
            _ticker: &str,
            limit: usize,
        ) -> Result<Vec<SocialPost>, SentimentError> {
            self.posts
                .as_ref()
                .map(|p| p.iter().take(limit).cloned().collect())
                .ok_or_else(|| SentimentError::Collector(format!("{} is down", self.platform)))
        }
    }

    #[tokio::test]
    async fn failed_collector_is_skipped_and_duplicates_dropped() {
        let collectors: Vec<Arc<dyn PostCollector>> = vec![
            Arc::new(FixedCollector {
                platform: "stocktwits",
                posts: Some(vec![
                    post("stocktwits", "1"),
                    post("stocktwits", "2"),
                    post("stocktwits", "1"),
                ]),
            }),
            Arc::new(FixedCollector {
                platform: "reddit",
                posts: None,
            }),
        ];

        let posts = collect_posts(&collectors, "NVDA", 30).await;
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["stocktwits_1", "stocktwits_2"]);
    }

    #[tokio::test]
    async fn limit_applies_per_platform() {
        let collectors: Vec<Arc<dyn PostCollector>> = vec![Arc::new(FixedCollector {
            platform: "stocktwits",
            posts: Some((0..10).map(|i| post("stocktwits", &i.to_string())).collect()),
        })];
        assert_eq!(collect_posts(&collectors, "NVDA", 4).await.len(), 4);
    }

    #[test]
    fn source_counts_include_silent_platforms() {
        let posts = [post("stocktwits", "1"), post("stocktwits", "2")];
        let counts = source_counts(&["stocktwits", "reddit"], &posts);
        assert_eq!(counts["stocktwits"], 2);
        assert_eq!(counts["reddit"], 0);
        assert_eq!(counts.len(), 2);
    }
}
