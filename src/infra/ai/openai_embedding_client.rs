use crate::core::embedding::EmbeddingProvider;
use crate::core::errors::RagError;
use crate::infra::http::{ensure_success, request_error};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "OpenAI embeddings";

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// Each `embed` call is a single request; batching happens in `Embedder`.
/// Results are put back in input order using the `index` field of each item.
pub struct OpenAiEmbeddingClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config("missing OpenAI API key".to_string()));
        }
        if model.trim().is_empty() {
            return Err(RagError::Config("missing embedding model name".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        tracing::debug!(inputs = inputs.len(), model = %self.model, "Requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        into_ordered_vectors(parsed, inputs.len())
    }
}

fn into_ordered_vectors(
    mut parsed: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    parsed.data.sort_by_key(|entry| entry.index);

    if parsed.data.len() != expected {
        return Err(RagError::permanent(
            SERVICE,
            format!(
                "returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            ),
        ));
    }

    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.request(texts).await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::permanent(SERVICE, "empty embedding response"))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
