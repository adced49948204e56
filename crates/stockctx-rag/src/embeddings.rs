//! Embedding providers.
//!
//! The index only ever sees `Vec<f32>`; everything that turns text into a
//! vector sits behind [`EmbeddingProvider`] so tests and alternative backends
//! can be swapped in.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stockctx_core::AppConfig;

use crate::error::RagError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError`] when the backend is unreachable or answers with
    /// something other than a single vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Length of the vectors this provider produces.
    fn dimension(&self) -> usize;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("url", &self.url)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Build an embedder from the workspace configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if `OPENAI_API_KEY` is not configured,
    /// or [`RagError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, RagError> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| RagError::Embedding("OPENAI_API_KEY is not set".to_string()))?;
        Self::with_base_url(
            &config.embedding_base_url,
            api_key,
            &config.embedding_model,
            config.embedding_dimension,
            config.request_timeout_secs,
        )
    }

    /// # Errors
    ///
    /// Returns [`RagError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout_secs: u64,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned status {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("embedding response parse error: {e}")))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::Embedding("embedding response contained no data".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
