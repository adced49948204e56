//! Service wiring shared by every command.

use std::sync::Arc;
use std::time::Duration;

use stockctx_core::AppConfig;
use stockctx_index::{PersistenceManager, SharedIndex};
use stockctx_rag::{EmbeddingProvider, IngestPool, OpenAiEmbedder, RetrievalService};
use stockctx_sentiment::{
    LexiconScorer, SentimentAggregator, SentimentService, StockTwitsCollector,
};

pub(crate) struct Services {
    pub(crate) config: AppConfig,
    pub(crate) index: Arc<SharedIndex>,
}

impl Services {
    /// Load the index snapshot at the configured path. Commands that only
    /// read counts or purge never need an embedding key.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub(crate) fn open(config: AppConfig) -> anyhow::Result<Self> {
        let persistence =
            PersistenceManager::new(config.index_path.clone(), config.embedding_dimension);
        let index = Arc::new(SharedIndex::open(persistence)?);
        tracing::debug!(
            path = %config.index_path.display(),
            documents = index.len(),
            "index opened"
        );
        Ok(Self { config, index })
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(OpenAiEmbedder::from_config(&self.config)?))
    }

    pub(crate) fn ingest_pool(&self) -> anyhow::Result<IngestPool> {
        Ok(self.pool_with(self.embedder()?))
    }

    pub(crate) fn retrieval(&self) -> anyhow::Result<RetrievalService> {
        Ok(self.retrieval_with(self.embedder()?))
    }

    pub(crate) fn sentiment(&self) -> anyhow::Result<SentimentService> {
        let embedder = self.embedder()?;
        let collector = StockTwitsCollector::from_config(&self.config)?;
        Ok(SentimentService::new(
            Arc::new(self.pool_with(Arc::clone(&embedder))),
            Arc::new(self.retrieval_with(embedder)),
            Arc::new(LexiconScorer),
        )
        .with_collector(Arc::new(collector))
        .with_aggregator(SentimentAggregator::new(self.config.sentiment))
        .with_max_posts_per_platform(self.config.max_posts_per_platform))
    }

    fn pool_with(&self, embedder: Arc<dyn EmbeddingProvider>) -> IngestPool {
        IngestPool::new(
            embedder,
            Arc::clone(&self.index),
            self.config.ingest_workers,
            Duration::from_secs(self.config.request_timeout_secs),
        )
    }

    fn retrieval_with(&self, embedder: Arc<dyn EmbeddingProvider>) -> RetrievalService {
        RetrievalService::new(embedder, Arc::clone(&self.index))
            .with_overfetch_multiplier(self.config.overfetch_multiplier)
    }
}
