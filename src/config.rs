// Runtime configuration, read from the environment (after `.env` is loaded).
// Everything except the OpenAI key has a default.

use crate::core::ai::AiConfig;
use crate::core::chunking::ChunkerConfig;
use crate::core::embedding::BatchLimits;
use crate::core::errors::RagError;
use crate::core::retry::RetryPolicy;
use crate::core::vector_store::DEFAULT_TOP_K;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_VECTOR_STORE_DIR: &str = ".vector_store";
pub const DEFAULT_COLLECTION_NAME: &str = "google_docs";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub embedding_batch: BatchLimits,
    pub chunker: ChunkerConfig,
    pub vector_store_dir: PathBuf,
    pub collection_name: String,
    pub top_k: usize,
    pub ai: AiConfig,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = value("OPENAI_API_KEY").ok_or_else(|| {
            RagError::Config(
                "Missing OPENAI_API_KEY environment variable! Add it to your .env file."
                    .to_string(),
            )
        })?;

        let chunker = ChunkerConfig {
            chunk_size: parse_or(&lookup, "CHUNK_SIZE_TOKENS", 4000)?,
            chunk_overlap: parse_or(&lookup, "CHUNK_OVERLAP_TOKENS", 200)?,
        };

        let ai = AiConfig {
            model: value("OPENAI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            ..AiConfig::default()
        };

        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 4u32)?.max(1),
            initial_backoff: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_INITIAL_BACKOFF_MS",
                500u64,
            )?),
            deadline: Some(Duration::from_secs(parse_or(
                &lookup,
                "RETRY_DEADLINE_SECS",
                120u64,
            )?)),
            ..RetryPolicy::default()
        };

        let defaults = BatchLimits::default();

        Ok(Self {
            openai_api_key,
            openai_base_url: value("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: value("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_batch: BatchLimits {
                max_inputs: parse_or(&lookup, "EMBEDDING_BATCH_SIZE", defaults.max_inputs)?.max(1),
                max_tokens: parse_or(&lookup, "EMBEDDING_BATCH_TOKENS", defaults.max_tokens)?
                    .max(1),
            },
            chunker,
            vector_store_dir: value("VECTOR_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VECTOR_STORE_DIR)),
            collection_name: value("COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            top_k: parse_or(&lookup, "RETRIEVAL_TOP_K", DEFAULT_TOP_K)?.max(1),
            ai,
            retry,
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 60u64)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, RagError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| RagError::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, RagError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.ai.temperature, 0.0);
        assert_eq!(config.embedding_batch.max_inputs, 512);
        assert_eq!(config.embedding_batch.max_tokens, 250_000);
        assert_eq!(config.chunker.chunk_size, 4000);
        assert_eq!(config.chunker.chunk_overlap, 200);
        assert_eq!(config.vector_store_dir, PathBuf::from(".vector_store"));
        assert_eq!(config.collection_name, "google_docs");
        assert_eq!(config.top_k, 4);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(500));
        assert_eq!(config.retry.deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(config_from(&[]), Err(RagError::Config(_))));
        assert!(matches!(
            config_from(&[("OPENAI_API_KEY", "  ")]),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
            ("CHUNK_SIZE_TOKENS", "1000"),
            ("CHUNK_OVERLAP_TOKENS", "50"),
            ("RETRIEVAL_TOP_K", "8"),
            ("RETRY_MAX_ATTEMPTS", "0"),
            ("VECTOR_STORE_DIR", "/tmp/vectors"),
            ("EMBEDDING_BATCH_SIZE", "64"),
            ("EMBEDDING_BATCH_TOKENS", "8000"),
        ])
        .unwrap();

        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.chunker.chunk_size, 1000);
        assert_eq!(config.chunker.chunk_overlap, 50);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.vector_store_dir, PathBuf::from("/tmp/vectors"));
        assert_eq!(
            config.embedding_batch,
            BatchLimits {
                max_inputs: 64,
                max_tokens: 8000,
            }
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("OPENAI_API_KEY", "sk-test"), ("RETRIEVAL_TOP_K", "many")])
            .unwrap_err();
        assert!(err.to_string().contains("RETRIEVAL_TOP_K"));
    }
}
