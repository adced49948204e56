//! Index, retrieval, and ingestion command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stockctx_index::DocumentDraft;
use stockctx_rag::{
    ingest_articles, ArticleFetcher, HttpArticleFetcher, NewsArticle, PreparedDocument,
    RetrievalFilter,
};

use crate::context::Services;

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn run_stats(services: &Services) -> anyhow::Result<()> {
    print_json(&services.index.stats())
}

/// Tickers are stored upper-case; command-line input may not be.
pub(crate) fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

pub(crate) fn search_filter(
    namespace: String,
    ticker: Option<String>,
    doc_type: Option<String>,
) -> RetrievalFilter {
    let mut filter = RetrievalFilter::namespace(namespace);
    if let Some(ticker) = ticker {
        filter = filter.with_ticker(normalize_ticker(&ticker));
    }
    if let Some(doc_type) = doc_type {
        filter = filter.with_doc_type(doc_type);
    }
    filter
}

/// Unlike the library's lenient lookup, a failed query embedding is reported
/// as an error here.
pub(crate) async fn run_search(
    services: &Services,
    query: &str,
    filter: &RetrievalFilter,
    k: Option<usize>,
) -> anyhow::Result<()> {
    let retrieval = services.retrieval()?;
    let k = k.unwrap_or(services.config.rag_top_k);
    let results = retrieval.try_retrieve_context(query, filter, k).await?;
    print_json(&results)
}

/// Parse one [`DocumentDraft`] per non-blank line.
///
/// # Errors
///
/// Returns an error naming the first line that is not a valid draft.
pub(crate) fn parse_drafts(text: &str) -> anyhow::Result<Vec<DocumentDraft>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid draft on line {}", i + 1))
        })
        .collect()
}

pub(crate) async fn run_ingest(services: &Services, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let drafts = parse_drafts(&text)?;
    let pool = services.ingest_pool()?;
    let stats = pool
        .run_batch(drafts.into_iter().map(PreparedDocument).collect())
        .await;
    print_json(&stats)
}

/// Either a bare article list or a news API response carrying `results`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ArticleFile {
    List(Vec<NewsArticle>),
    Envelope { results: Vec<NewsArticle> },
}

impl ArticleFile {
    pub(crate) fn into_articles(self) -> Vec<NewsArticle> {
        match self {
            Self::List(articles) | Self::Envelope { results: articles } => articles,
        }
    }
}

pub(crate) async fn run_articles(
    services: &Services,
    ticker: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let articles = serde_json::from_str::<ArticleFile>(&text)
        .with_context(|| format!("{} is not a list of articles", file.display()))?
        .into_articles();

    let pool = services.ingest_pool()?;
    let fetcher: Arc<dyn ArticleFetcher> =
        Arc::new(HttpArticleFetcher::new(services.config.request_timeout_secs)?);
    let stats = ingest_articles(
        &pool,
        &fetcher,
        ticker,
        articles,
        services.config.max_articles,
    )
    .await;
    print_json(&stats)
}

#[derive(Debug, Serialize)]
struct PurgeReport<'a> {
    ticker: String,
    namespace: Option<&'a str>,
    removed: usize,
}

pub(crate) fn run_purge(
    services: &Services,
    ticker: &str,
    namespace: Option<&str>,
) -> anyhow::Result<()> {
    let ticker = normalize_ticker(ticker);
    let removed = services.index.purge(&ticker, namespace)?;
    if removed > 0 {
        services.index.save()?;
    }
    print_json(&PurgeReport {
        ticker,
        namespace,
        removed,
    })
}
