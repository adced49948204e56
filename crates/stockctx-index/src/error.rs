use std::path::PathBuf;

use thiserror::Error;

use crate::vector::InternalId;

#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector's length differs from the index dimension. Raised instead of
    /// storing anything so a misconfigured embedder is caught on first use.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index dimension must be non-zero")]
    ZeroDimension,

    #[error("vector contains non-finite components")]
    NonFinite,

    /// `put` was called for a key that is already stored. Callers must check
    /// `exists` first.
    #[error("duplicate document key: {0}")]
    DuplicateKey(String),

    #[error("internal id {0} is already mapped to a record")]
    IdInUse(InternalId),

    #[error("unknown internal id: {0}")]
    UnknownId(InternalId),

    #[error("snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}
