//! StockTwits public symbol stream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use stockctx_core::AppConfig;

use super::PostCollector;
use crate::error::SentimentError;
use crate::types::SocialPost;

const PLATFORM: &str = "stocktwits";
const USER_AGENT: &str = "stockctx/0.1";
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    response: Option<ResponseStatus>,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    status: u16,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: Option<u64>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    likes: Option<Likes>,
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Likes {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Entities {
    #[serde(default)]
    sentiment: Option<PlatformSentiment>,
}

#[derive(Debug, Deserialize)]
struct PlatformSentiment {
    basic: Option<String>,
}

pub struct StockTwitsCollector {
    client: reqwest::Client,
    base_url: String,
}

impl StockTwitsCollector {
    /// # Errors
    ///
    /// Returns [`SentimentError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SentimentError> {
        Self::with_base_url(&config.stocktwits_base_url, config.request_timeout_secs)
    }

    /// # Errors
    ///
    /// Returns [`SentimentError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, SentimentError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PostCollector for StockTwitsCollector {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn collect(
        &self,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<SocialPost>, SentimentError> {
        let ticker = ticker.to_uppercase();
        let url = format!(
            "{}/streams/symbol/{}.json",
            self.base_url,
            utf8_percent_encode(&ticker, NON_ALPHANUMERIC)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SentimentError::Collector(format!(
                "StockTwits returned status {} for {ticker}",
                response.status()
            )));
        }

        let stream: StreamResponse = response
            .json()
            .await
            .map_err(|e| SentimentError::Collector(format!("StockTwits parse error: {e}")))?;

        let status = stream.response.as_ref().map(|r| r.status);
        if status != Some(200) {
            return Err(SentimentError::Collector(format!(
                "StockTwits stream status {status:?} for {ticker}"
            )));
        }

        let posts: Vec<SocialPost> = stream
            .messages
            .into_iter()
            .take(limit)
            .filter_map(|m| standardize(m, &ticker))
            .collect();
        tracing::info!(ticker = %ticker, count = posts.len(), "collected StockTwits posts");
        Ok(posts)
    }
}

fn standardize(message: Message, ticker: &str) -> Option<SocialPost> {
    let id = message.id?;
    let body = message.body.trim();
    if body.is_empty() {
        return None;
    }

    let username = message.user.and_then(|u| u.username);
    let likes = message.likes.map_or(0, |l| l.total);
    let timestamp = normalize_timestamp(&message.created_at);
    let platform_sentiment = message
        .entities
        .and_then(|e| e.sentiment)
        .and_then(|s| s.basic);

    Some(SocialPost {
        id: format!("{PLATFORM}_{id}"),
        platform: PLATFORM.to_string(),
        ticker: ticker.to_string(),
        content: body.to_string(),
        author: username.clone().unwrap_or_else(|| "unknown".to_string()),
        timestamp,
        likes,
        comments: 0,
        engagement_score: likes,
        url: format!(
            "https://stocktwits.com/{}/message/{id}",
            username.unwrap_or_default()
        ),
        platform_sentiment,
    })
}

/// RFC 3339 with an explicit offset when parseable, the raw value otherwise.
fn normalize_timestamp(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(
        DateTime::parse_from_rfc3339(raw)
            .map_or_else(|_| raw.to_string(), |dt| dt.to_rfc3339()),
    )
}
