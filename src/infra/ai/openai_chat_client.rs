use crate::core::ai::{
    models::{AiConfig, AiMessage},
    AiProvider,
};
use crate::core::errors::RagError;
use crate::infra::http::{ensure_success, request_error};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const SERVICE: &str = "OpenAI chat";

/// Chat completions against any OpenAI-compatible endpoint
/// (api.openai.com, OpenRouter, a local proxy).
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, RagError> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config("missing OpenAI API key".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiChatClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<String, RagError> {
        let mut payload = json!({
            "model": config.model,
            "messages": messages,
            "temperature": config.temperature,
        });
        if let Some(max_tokens) = config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let content = parse_content(&response_json)?;

        tracing::debug!(
            model = %config.model,
            chars = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }
}

fn parse_content(response_json: &serde_json::Value) -> Result<String, RagError> {
    response_json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RagError::permanent(SERVICE, "failed to parse response content"))
}
