use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::cost::UsageTracker;
use crate::retry::retry;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const EMBED_BATCH_SIZE: usize = 100;
const EMBED_MAX_ATTEMPTS: u32 = 3;
const EMBED_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Text embedding provider. Production uses the OpenAI API; tests use a
/// deterministic stand-in.
#[async_trait]
pub trait EmbedText: Send + Sync {
    /// Embed each input, returning vectors in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Error)]
enum EmbedError {
    /// Rate limit or server-side failure, worth retrying
    #[error("embedding request throttled or failed upstream: {0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(anyhow::Error),
}

impl EmbedError {
    fn is_retryable(&self) -> bool {
        matches!(self, EmbedError::Transient(_))
    }
}

/// Configuration for the OpenAI embeddings API
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub api_key: String,
    pub model: String,
}

impl EmbedderConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;
        Ok(Self {
            api_key,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        })
    }
}

/// OpenAI embeddings client with batching and bounded retry on throttling
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
    usage: Arc<UsageTracker>,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbedderConfig, usage: Arc<UsageTracker>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            usage,
        }
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| EmbedError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(EmbedError::Transient(format!("status {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Fatal(anyhow!(
                "Embedding request failed ({}): {}",
                status,
                body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Fatal(anyhow!("Failed to parse embedding response: {}", e)))?;

        self.usage.add_embedding_tokens(parsed.usage.total_tokens);

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbedText for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(inputs.len());

        for batch in inputs.chunks(EMBED_BATCH_SIZE) {
            let result = retry(
                EMBED_MAX_ATTEMPTS,
                EMBED_RETRY_BACKOFF,
                EmbedError::is_retryable,
                |_| self.embed_batch(batch),
            )
            .await;

            match result {
                Ok(batch_embeddings) => embeddings.extend(batch_embeddings),
                Err(EmbedError::Transient(msg)) => {
                    return Err(anyhow!("Embedding retries exhausted: {}", msg))
                }
                Err(EmbedError::Fatal(err)) => return Err(err),
            }
        }

        Ok(embeddings)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: EmbeddingUsage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_vectors_sorted_by_index() {
        let raw = r#"{
            "data": [
                {"index": 1, "embedding": [0.2, 0.2]},
                {"index": 0, "embedding": [0.1, 0.1]}
            ],
            "usage": {"total_tokens": 12}
        }"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.1]);
        assert_eq!(parsed.usage.total_tokens, 12);
    }
}
