//! Retrieval-augmented context over the stockctx index.
//!
//! Embeds text through an [`EmbeddingProvider`], feeds documents into the
//! shared index through a long-lived [`IngestPool`], and answers filtered
//! top-k queries with [`RetrievalService`].

pub mod articles;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod retrieval;

pub use articles::{
    article_external_id, ingest_articles, ArticleFetcher, ArticleSource, HttpArticleFetcher,
    NewsArticle, Publisher, NEWS_DOC_TYPE, NEWS_NAMESPACE,
};
pub use embeddings::{EmbeddingProvider, OpenAiEmbedder};
pub use error::RagError;
pub use ingest::{BatchStats, DocumentSource, IngestPool, PreparedDocument};
pub use retrieval::{
    RetrievalFilter, RetrievalService, RetrievedContext, DEFAULT_OVERFETCH_MULTIPLIER,
};
