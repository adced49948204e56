use stockctx_rag::RagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector error: {0}")]
    Collector(String),

    #[error(transparent)]
    Retrieval(#[from] RagError),
}
