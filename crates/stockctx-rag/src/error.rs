use stockctx_index::IndexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("article fetch error: {0}")]
    Fetch(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}
