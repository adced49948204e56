use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "STOCKCTX_ENV"));
}

#[test]
fn build_app_config_uses_defaults_for_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.index_path.to_string_lossy(), "./data/vector_index");
    assert_eq!(cfg.embedding_dimension, 1536);
    assert_eq!(cfg.embedding_model, "text-embedding-3-small");
    assert_eq!(cfg.embedding_base_url, "https://api.openai.com/v1");
    assert!(cfg.openai_api_key.is_none());
    assert_eq!(cfg.rag_top_k, 5);
    assert_eq!(cfg.overfetch_multiplier, 5);
    assert_eq!(cfg.ingest_workers, 5);
    assert_eq!(cfg.request_timeout_secs, 10);
    assert_eq!(cfg.max_posts_per_platform, 30);
    assert_eq!(cfg.max_articles, 20);
    assert_eq!(cfg.sentiment, SentimentTuning::default());
}

#[test]
fn default_sentiment_tuning_matches_calibrated_constants() {
    let tuning = SentimentTuning::default();
    assert_eq!(tuning.min_confidence, 0.6);
    assert_eq!(tuning.bearish_threshold, -0.15);
    assert_eq!(tuning.bullish_threshold, 0.3);
    assert_eq!(tuning.neutral_base, -0.05);
}

#[test]
fn blank_api_key_is_treated_as_missing() {
    let mut map = HashMap::new();
    map.insert("OPENAI_API_KEY", "   ");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.openai_api_key.is_none());
}

#[test]
fn api_key_is_redacted_in_debug_output() {
    let mut map = HashMap::new();
    map.insert("OPENAI_API_KEY", "sk-secret-value");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("sk-secret-value"));
    assert!(rendered.contains("[redacted]"));
}

#[test]
fn embedding_dimension_override() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_EMBEDDING_DIM", "384");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.embedding_dimension, 384);
}

#[test]
fn embedding_dimension_zero_is_rejected() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_EMBEDDING_DIM", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "STOCKCTX_EMBEDDING_DIM"),
        "expected InvalidEnvVar(STOCKCTX_EMBEDDING_DIM), got: {result:?}"
    );
}

#[test]
fn ingest_workers_invalid() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_INGEST_WORKERS", "many");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "STOCKCTX_INGEST_WORKERS"),
        "expected InvalidEnvVar(STOCKCTX_INGEST_WORKERS), got: {result:?}"
    );
}

#[test]
fn request_timeout_override() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_REQUEST_TIMEOUT_SECS", "30");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.request_timeout_secs, 30);
}

#[test]
fn sentiment_thresholds_override() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_SENTIMENT_BEARISH_THRESHOLD", "-0.2");
    map.insert("STOCKCTX_SENTIMENT_BULLISH_THRESHOLD", "0.2");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.sentiment.bearish_threshold, -0.2);
    assert_eq!(cfg.sentiment.bullish_threshold, 0.2);
    assert_eq!(cfg.sentiment.min_confidence, 0.6);
}

#[test]
fn sentiment_threshold_not_a_number() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_SENTIMENT_MIN_CONFIDENCE", "high");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "STOCKCTX_SENTIMENT_MIN_CONFIDENCE"),
        "expected InvalidEnvVar(STOCKCTX_SENTIMENT_MIN_CONFIDENCE), got: {result:?}"
    );
}

#[test]
fn sentiment_threshold_nan_is_rejected() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_SENTIMENT_NEUTRAL_BASE", "NaN");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
fn inverted_thresholds_are_rejected() {
    let mut map = HashMap::new();
    map.insert("STOCKCTX_SENTIMENT_BEARISH_THRESHOLD", "0.5");
    map.insert("STOCKCTX_SENTIMENT_BULLISH_THRESHOLD", "0.1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "STOCKCTX_SENTIMENT_BEARISH_THRESHOLD"),
        "expected InvalidEnvVar(STOCKCTX_SENTIMENT_BEARISH_THRESHOLD), got: {result:?}"
    );
}
