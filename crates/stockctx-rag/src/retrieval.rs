//! Filtered top-k retrieval over the shared index.
//!
//! The index has no predicate support, so retrieval overfetches
//! `k * multiplier` candidates and filters them afterwards. If fewer than `k`
//! matching records fall inside the overfetch window the result is short;
//! callers get best-effort top-k, never an error for it.

use std::sync::Arc;

use serde::Serialize;
use stockctx_index::{l2_normalize, DocumentRecord, IndexError, SharedIndex};

use crate::embeddings::EmbeddingProvider;
use crate::error::RagError;

pub const DEFAULT_OVERFETCH_MULTIPLIER: usize = 5;

/// Which records a retrieval may return. `ticker` and `doc_type` are only
/// checked when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalFilter {
    pub namespace: String,
    pub ticker: Option<String>,
    pub doc_type: Option<String>,
}

impl RetrievalFilter {
    #[must_use]
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ticker: None,
            doc_type: None,
        }
    }

    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    #[must_use]
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    #[must_use]
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        record.namespace == self.namespace
            && self.ticker.as_ref().is_none_or(|t| &record.ticker == t)
            && self.doc_type.as_ref().is_none_or(|d| &record.doc_type == d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub score: f32,
    pub external_id: String,
    pub metadata: DocumentRecord,
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<SharedIndex>,
    overfetch_multiplier: usize,
}

impl RetrievalService {
    #[must_use]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<SharedIndex>) -> Self {
        Self {
            embedder,
            index,
            overfetch_multiplier: DEFAULT_OVERFETCH_MULTIPLIER,
        }
    }

    /// A multiplier of 0 is treated as 1.
    #[must_use]
    pub fn with_overfetch_multiplier(mut self, multiplier: usize) -> Self {
        self.overfetch_multiplier = multiplier.max(1);
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SharedIndex> {
        &self.index
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Retrieve up to `k` records matching `filter`, most similar first.
    ///
    /// Failures are logged and yield an empty list. Use
    /// [`RetrievalService::try_retrieve_context`] to see them.
    pub async fn retrieve_context(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        k: usize,
    ) -> Vec<RetrievedContext> {
        match self.try_retrieve_context(query, filter, k).await {
            Ok(results) => results,
            Err(RagError::Index(e)) => {
                tracing::error!(
                    namespace = %filter.namespace,
                    error = %e,
                    "retrieval failed against the index"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %filter.namespace,
                    error = %e,
                    "query embedding failed; returning no context"
                );
                Vec::new()
            }
        }
    }

    /// # Errors
    ///
    /// Returns the embedder's error if the query cannot be embedded, or
    /// [`IndexError::DimensionMismatch`] (wrapped) if the embedder produces
    /// vectors of the wrong size for the index.
    pub async fn try_retrieve_context(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        k: usize,
    ) -> Result<Vec<RetrievedContext>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut vector = self.embedder.embed(query).await?;
        l2_normalize(&mut vector);

        let multiplier = self.overfetch_multiplier;
        let results = self.index.with_read(|index, store| {
            let overfetch = k.saturating_mul(multiplier).min(index.len());
            let hits = index.search(&vector, overfetch)?;

            let mut out = Vec::with_capacity(k);
            for hit in hits {
                let Some(record) = store.get(hit.id) else {
                    continue;
                };
                if !filter.matches(record) {
                    continue;
                }
                out.push(RetrievedContext {
                    score: hit.score,
                    external_id: record.external_id().to_string(),
                    metadata: record.clone(),
                });
                if out.len() == k {
                    break;
                }
            }
            Ok::<_, IndexError>(out)
        })?;

        tracing::debug!(
            namespace = %filter.namespace,
            k,
            returned = results.len(),
            "retrieved context"
        );
        Ok(results)
    }
}
