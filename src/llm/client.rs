//! Model backend client for the Messages API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::types::{ChatMessage, ModelResponse, ToolDefinition};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Error type for model backend calls
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty response from model backend")]
    EmptyResponse,
}

/// Anything that can answer one model turn.
///
/// The agent loop only talks to this trait, so tests drive it with scripted
/// backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model identifier, for spans and metrics
    fn model(&self) -> &str;

    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError>;
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Client for the `/v1/messages` endpoint with tool support
#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.anthropic.com")
    /// * `api_key` - Sent as `x-api-key`
    /// * `model` - Model identifier for every request
    /// * `max_tokens` - Response token ceiling
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<serde_json::Value, ChatError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }
        Ok(body)
    }
}

#[async_trait]
impl ModelBackend for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError> {
        let endpoint = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(system, messages, tools)?;

        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(parsed) => format!("{}: {}", parsed.error.kind, parsed.error.message),
                Err(_) => text,
            };
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        Ok(serde_json::from_str(&text)?)
    }
}
