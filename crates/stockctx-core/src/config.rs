use crate::app_config::{AppConfig, Environment, SentimentTuning};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let parse_f64 = |var: &str, default: f64| -> Result<f64, ConfigError> {
        match lookup(var) {
            Ok(raw) => {
                let value = raw
                    .parse::<f64>()
                    .map_err(|e| invalid(var, e.to_string()))?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(invalid(var, "must be a finite number".to_string()))
                }
            }
            Err(_) => Ok(default),
        }
    };

    let env = parse_environment(&or_default("STOCKCTX_ENV", "development"))?;
    let log_level = or_default("STOCKCTX_LOG_LEVEL", "info");
    let index_path = PathBuf::from(or_default("STOCKCTX_INDEX_PATH", "./data/vector_index"));

    let embedding_dimension = parse_positive("STOCKCTX_EMBEDDING_DIM", "1536")?;
    let embedding_model = or_default("EMBEDDING_MODEL", "text-embedding-3-small");
    let embedding_base_url = or_default("STOCKCTX_EMBEDDING_URL", "https://api.openai.com/v1");
    let openai_api_key = lookup("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());

    let rag_top_k = parse_positive("RAG_TOP_K", "5")?;
    let overfetch_multiplier = parse_positive("STOCKCTX_OVERFETCH_MULTIPLIER", "5")?;
    let ingest_workers = parse_positive("STOCKCTX_INGEST_WORKERS", "5")?;
    let request_timeout_secs = parse_u64("STOCKCTX_REQUEST_TIMEOUT_SECS", "10")?;
    let max_posts_per_platform = parse_positive("STOCKCTX_MAX_POSTS_PER_PLATFORM", "30")?;
    let max_articles = parse_positive("STOCKCTX_MAX_ARTICLES", "20")?;
    let stocktwits_base_url = or_default(
        "STOCKCTX_STOCKTWITS_URL",
        "https://api.stocktwits.com/api/2",
    );

    let defaults = SentimentTuning::default();
    let sentiment = SentimentTuning {
        min_confidence: parse_f64("STOCKCTX_SENTIMENT_MIN_CONFIDENCE", defaults.min_confidence)?,
        bearish_threshold: parse_f64(
            "STOCKCTX_SENTIMENT_BEARISH_THRESHOLD",
            defaults.bearish_threshold,
        )?,
        bullish_threshold: parse_f64(
            "STOCKCTX_SENTIMENT_BULLISH_THRESHOLD",
            defaults.bullish_threshold,
        )?,
        neutral_base: parse_f64("STOCKCTX_SENTIMENT_NEUTRAL_BASE", defaults.neutral_base)?,
    };

    if sentiment.bearish_threshold > sentiment.bullish_threshold {
        return Err(invalid(
            "STOCKCTX_SENTIMENT_BEARISH_THRESHOLD",
            "must not exceed the bullish threshold".to_string(),
        ));
    }

    Ok(AppConfig {
        env,
        log_level,
        index_path,
        embedding_dimension,
        embedding_model,
        embedding_base_url,
        openai_api_key,
        rag_top_k,
        overfetch_multiplier,
        ingest_workers,
        request_timeout_secs,
        max_posts_per_platform,
        max_articles,
        stocktwits_base_url,
        sentiment,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "STOCKCTX_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
