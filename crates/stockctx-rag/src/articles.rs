//! News article ingestion: fetch full text, fall back to the feed
//! description, and index the result in the `news` namespace.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use stockctx_index::{namespaced_key, DocumentDraft};

use crate::error::RagError;
use crate::ingest::{BatchStats, DocumentSource, IngestPool};

pub const NEWS_NAMESPACE: &str = "news";
pub const NEWS_DOC_TYPE: &str = "news_article";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockctx/0.1; +https://github.com/stockctx)";
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Descriptions shorter than this are not worth embedding on their own.
const MIN_DESCRIPTION_CHARS: usize = 50;
const MIN_CLEAN_TEXT_CHARS: usize = 100;
const MIN_PARAGRAPH_TEXT_CHARS: usize = 200;
const MIN_PARAGRAPHS: usize = 3;
const PREVIEW_CHARS: usize = 200;

static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid json-ld script regex")
});
static NOISE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<nav\b[^>]*>.*?</nav>|<footer\b[^>]*>.*?</footer>|<header\b[^>]*>.*?</header>|<aside\b[^>]*>.*?</aside>",
    )
    .expect("valid noise block regex")
});
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("valid paragraph regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));
static ADVERT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Advertisement|ADVERTISEMENT").expect("valid advert regex"));
static READ_MORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Read more:.*?\.").expect("valid read-more regex"));

/// One item of a ticker news feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsArticle {
    pub title: String,
    pub article_url: String,
    pub description: Option<String>,
    pub published_utc: Option<String>,
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Publisher {
    pub name: Option<String>,
}

/// `"{TICKER}_news_{first 12 hex chars of sha256(url)}"`.
#[must_use]
pub fn article_external_id(ticker: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex = digest[..6]
        .iter()
        .fold(String::with_capacity(12), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        });
    format!("{ticker}_news_{hex}")
}

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetch `url` and return its cleaned article text, or `None` when the
    /// page is unreachable or has no usable body.
    async fn fetch(&self, url: &str) -> Option<String>;
}

pub struct HttpArticleFetcher {
    client: reqwest::Client,
}

impl HttpArticleFetcher {
    /// # Errors
    ///
    /// Returns [`RagError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: u64) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "article request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(url, status = %response.status(), "article request rejected");
            return None;
        }
        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "article body unreadable");
                return None;
            }
        };

        let text = extract_article_text(&html);
        if text.is_none() {
            tracing::debug!(url, "no article text found in page");
        }
        text
    }
}

/// Prefer a schema.org `articleBody`; otherwise join the page's paragraphs.
#[must_use]
pub fn extract_article_text(html: &str) -> Option<String> {
    json_ld_article_body(html)
        .or_else(|| paragraph_text(html))
        .and_then(|raw| clean_text(&raw))
}

fn json_ld_article_body(html: &str) -> Option<String> {
    JSON_LD_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
        .find_map(|value| article_body_in(&value))
}

fn article_body_in(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(article_body_in),
        Value::Object(map) => {
            if is_article_type(map.get("@type")) {
                if let Some(body) = map.get("articleBody").and_then(Value::as_str) {
                    if !body.trim().is_empty() {
                        return Some(body.to_string());
                    }
                }
            }
            map.get("@graph").and_then(article_body_in)
        }
        _ => None,
    }
}

fn is_article_type(node_type: Option<&Value>) -> bool {
    const ARTICLE_TYPES: [&str; 3] = ["Article", "NewsArticle", "BlogPosting"];
    match node_type {
        Some(Value::String(s)) => ARTICLE_TYPES.contains(&s.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| ARTICLE_TYPES.contains(&t)),
        _ => false,
    }
}

fn paragraph_text(html: &str) -> Option<String> {
    let body = NOISE_BLOCK_RE.replace_all(html, " ");
    let paragraphs: Vec<String> = PARAGRAPH_RE
        .captures_iter(&body)
        .filter_map(|cap| cap.get(1))
        .map(|m| decode_entities(&TAG_RE.replace_all(m.as_str(), "")))
        .collect();
    if paragraphs.len() < MIN_PARAGRAPHS {
        return None;
    }
    let text = paragraphs.join(" ");
    (text.chars().count() > MIN_PARAGRAPH_TEXT_CHARS).then_some(text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Strip markup and boilerplate; `None` if too little text remains.
#[must_use]
pub fn clean_text(text: &str) -> Option<String> {
    let no_tags = TAG_RE.replace_all(text, " ");
    let collapsed = no_tags.split_whitespace().collect::<Vec<_>>().join(" ");
    let no_ads = ADVERT_RE.replace_all(&collapsed, "");
    let no_read_more = READ_MORE_RE.replace_all(&no_ads, "");
    let cleaned = no_read_more.split_whitespace().collect::<Vec<_>>().join(" ");
    (cleaned.chars().count() > MIN_CLEAN_TEXT_CHARS).then_some(cleaned)
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// A feed article waiting to be fetched and indexed.
pub struct ArticleSource {
    ticker: String,
    external_id: String,
    article: NewsArticle,
    fetcher: Arc<dyn ArticleFetcher>,
}

impl ArticleSource {
    #[must_use]
    pub fn new(ticker: &str, article: NewsArticle, fetcher: Arc<dyn ArticleFetcher>) -> Self {
        let ticker = ticker.to_uppercase();
        Self {
            external_id: article_external_id(&ticker, &article.article_url),
            ticker,
            article,
            fetcher,
        }
    }
}

#[async_trait]
impl DocumentSource for ArticleSource {
    fn namespaced_key(&self) -> String {
        namespaced_key(NEWS_NAMESPACE, &self.external_id)
    }

    async fn resolve(&self) -> Result<DocumentDraft, RagError> {
        let url = self.article.article_url.as_str();
        let content = match self.fetcher.fetch(url).await {
            Some(text) => text,
            None => self
                .article
                .description
                .clone()
                .filter(|d| d.chars().count() >= MIN_DESCRIPTION_CHARS)
                .ok_or_else(|| RagError::Fetch(format!("no usable content for {url}")))?,
        };

        let source = self
            .article
            .publisher
            .as_ref()
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let attributes = [
            ("title", Value::from(self.article.title.clone())),
            ("url", Value::from(url)),
            (
                "published_date",
                Value::from(self.article.published_utc.clone().unwrap_or_default()),
            ),
            ("source", Value::from(source)),
            ("content_preview", Value::from(preview(&content))),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Ok(DocumentDraft {
            namespace: NEWS_NAMESPACE.to_string(),
            external_id: self.external_id.clone(),
            ticker: self.ticker.clone(),
            doc_type: NEWS_DOC_TYPE.to_string(),
            attributes,
            full_text: content,
        })
    }
}

/// Index at most `max_articles` articles for `ticker`. Articles already in
/// the index are skipped before any fetch.
pub async fn ingest_articles(
    pool: &IngestPool,
    fetcher: &Arc<dyn ArticleFetcher>,
    ticker: &str,
    articles: Vec<NewsArticle>,
    max_articles: usize,
) -> BatchStats {
    let sources: Vec<ArticleSource> = articles
        .into_iter()
        .take(max_articles)
        .map(|article| ArticleSource::new(ticker, article, Arc::clone(fetcher)))
        .collect();
    tracing::info!(ticker, count = sources.len(), "ingesting news articles");
    pool.run_batch(sources).await
}
