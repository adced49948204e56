//! Bounded embed-and-insert worker pool.
//!
//! One pool lives for the whole process and every batch draws from the same
//! permits, so two concurrent batches never exceed the configured worker
//! count between them. Items are never retried: a failed fetch, embedding, or
//! insert counts the item as failed and the batch carries on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use stockctx_index::{DocumentDraft, InsertOutcome, SharedIndex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::embeddings::EmbeddingProvider;
use crate::error::RagError;

/// Something that can be turned into a document draft inside a worker.
///
/// `namespaced_key` must be cheap and must equal the key of the draft that
/// `resolve` returns; it is used for the dedup check before any I/O.
#[async_trait]
pub trait DocumentSource: Send + Sync + 'static {
    fn namespaced_key(&self) -> String;

    /// # Errors
    ///
    /// Any error marks the item as failed.
    async fn resolve(&self) -> Result<DocumentDraft, RagError>;
}

/// A draft that needs no further fetching.
#[derive(Debug, Clone)]
pub struct PreparedDocument(pub DocumentDraft);

#[async_trait]
impl DocumentSource for PreparedDocument {
    fn namespaced_key(&self) -> String {
        self.0.namespaced_key()
    }

    async fn resolve(&self) -> Result<DocumentDraft, RagError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.embedded + self.skipped + self.failed
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Embedded => self.embedded += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Embedded,
    Skipped,
    Failed,
}

pub struct IngestPool {
    permits: Arc<Semaphore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<SharedIndex>,
    embed_timeout: Duration,
}

impl IngestPool {
    /// `workers` is clamped to at least 1.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<SharedIndex>,
        workers: usize,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            embedder,
            index,
            embed_timeout,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SharedIndex> {
        &self.index
    }

    /// Embed and insert every item, then save the snapshot if anything new
    /// was stored. A failed save is logged; the in-memory index keeps the
    /// documents and the next successful save persists them.
    pub async fn run_batch<S: DocumentSource>(&self, items: Vec<S>) -> BatchStats {
        let submitted = items.len();
        let mut tasks = JoinSet::new();
        for item in items {
            let permits = Arc::clone(&self.permits);
            let embedder = Arc::clone(&self.embedder);
            let index = Arc::clone(&self.index);
            let embed_timeout = self.embed_timeout;
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return ItemOutcome::Failed;
                };
                process_item(&item, embedder.as_ref(), &index, embed_timeout).await
            });
        }

        let mut stats = BatchStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    tracing::warn!(error = %e, "ingest task did not complete");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(
            submitted,
            embedded = stats.embedded,
            skipped = stats.skipped,
            failed = stats.failed,
            "ingest batch finished"
        );

        if stats.embedded > 0 {
            self.persist().await;
        }
        stats
    }

    async fn persist(&self) {
        let index = Arc::clone(&self.index);
        match tokio::task::spawn_blocking(move || index.save()).await {
            Ok(Ok(())) => tracing::debug!("index snapshot saved"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to save index snapshot"),
            Err(e) => tracing::warn!(error = %e, "index save task did not complete"),
        }
    }
}

async fn process_item<S: DocumentSource>(
    item: &S,
    embedder: &dyn EmbeddingProvider,
    index: &SharedIndex,
    embed_timeout: Duration,
) -> ItemOutcome {
    let key = item.namespaced_key();
    if index.contains(&key) {
        return ItemOutcome::Skipped;
    }

    let draft = match item.resolve().await {
        Ok(draft) => draft,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "could not resolve document");
            return ItemOutcome::Failed;
        }
    };

    let vector = match tokio::time::timeout(embed_timeout, embedder.embed(&draft.full_text)).await
    {
        Ok(Ok(vector)) => vector,
        Ok(Err(e)) => {
            tracing::warn!(key = %key, error = %e, "embedding failed");
            return ItemOutcome::Failed;
        }
        Err(_) => {
            tracing::warn!(
                key = %key,
                timeout_ms = u64::try_from(embed_timeout.as_millis()).unwrap_or(u64::MAX),
                "embedding timed out"
            );
            return ItemOutcome::Failed;
        }
    };

    match index.insert(draft, vector) {
        Ok(InsertOutcome::Inserted(id)) => {
            tracing::debug!(key = %key, internal_id = id, "document indexed");
            ItemOutcome::Embedded
        }
        Ok(InsertOutcome::AlreadyPresent) => ItemOutcome::Skipped,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "index insert failed");
            ItemOutcome::Failed
        }
    }
}
