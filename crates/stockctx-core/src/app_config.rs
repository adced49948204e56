use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Bias-correction constants for sentiment aggregation.
///
/// These were picked empirically against a positively skewed source mix and
/// are configuration, not derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentTuning {
    /// Posts scored below this classifier confidence are left out of the
    /// weighted sum (they still count in the distribution).
    pub min_confidence: f64,
    /// Scores strictly below this are bearish.
    pub bearish_threshold: f64,
    /// Scores strictly above this are bullish.
    pub bullish_threshold: f64,
    /// Base score contributed by a neutral post.
    pub neutral_base: f64,
}

impl Default for SentimentTuning {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            bearish_threshold: -0.15,
            bullish_threshold: 0.3,
            neutral_base: -0.05,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub index_path: PathBuf,
    pub embedding_dimension: usize,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub openai_api_key: Option<String>,
    pub rag_top_k: usize,
    pub overfetch_multiplier: usize,
    pub ingest_workers: usize,
    pub request_timeout_secs: u64,
    pub max_posts_per_platform: usize,
    pub max_articles: usize,
    pub stocktwits_base_url: String,
    pub sentiment: SentimentTuning,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("index_path", &self.index_path)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_base_url", &self.embedding_base_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("rag_top_k", &self.rag_top_k)
            .field("overfetch_multiplier", &self.overfetch_multiplier)
            .field("ingest_workers", &self.ingest_workers)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_posts_per_platform", &self.max_posts_per_platform)
            .field("max_articles", &self.max_articles)
            .field("stocktwits_base_url", &self.stocktwits_base_url)
            .field("sentiment", &self.sentiment)
            .finish()
    }
}
