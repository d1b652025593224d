//! OpenAI provider adapter
//!
//! Speaks the chat-completions API with bearer authentication. The wire
//! types here are shared with the OpenRouter adapter, which uses the same
//! request and response shapes.

use super::{Backend, ProviderAdapter};
use crate::completion::{Completion, CompletionRequest};
use crate::error::{Error, Result};
use crate::pricing::CostModel;
use crate::token::estimate_tokens;
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// OpenAI API base URL
pub const BASE_URL: &str = "https://api.openai.com/v1";

/// Available OpenAI models
pub const MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

/// Default OpenAI model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI adapter configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::NotConfigured("OPENAI_API_KEY not set".to_string()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model,
            timeout: Duration::from_secs(60),
        })
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// Chat-completions wire types, shared with the OpenRouter adapter.

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Build a chat-completions request body from a canonical request.
pub(crate) fn build_chat_request(model: &str, request: &CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system_prompt {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });

    ChatRequest {
        model: model.to_string(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        response_format: request.json_mode.then(|| ResponseFormat {
            r#type: "json_object".to_string(),
        }),
    }
}

/// Pull text and token counts out of a chat-completions response,
/// estimating tokens when the vendor omits usage counters.
pub(crate) fn extract_chat_response(
    backend: Backend,
    response: ChatResponse,
    request: &CompletionRequest,
) -> Result<(String, u32, u32)> {
    let choice = response.choices.into_iter().next().ok_or(Error::Provider {
        backend,
        message: "no choices in response".to_string(),
    })?;
    let text = choice.message.content.unwrap_or_default();

    let (input_tokens, output_tokens) = match response.usage {
        Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
        None => (estimate_tokens(&request.prompt), estimate_tokens(&text)),
    };

    Ok((text, input_tokens, output_tokens))
}

/// OpenAI adapter
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
    pricing: Arc<CostModel>,
}

impl OpenAiAdapter {
    /// Create a new OpenAI adapter
    pub fn new(config: OpenAiConfig, pricing: Arc<CostModel>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            pricing,
        })
    }

    fn provider_error(&self, message: String) -> Error {
        Error::Provider {
            backend: Backend::OpenAi,
            message,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = build_chat_request(&self.config.model, request);

        debug!("sending request to OpenAI");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(format!("network error: {e}")))?;

        let status = response.status();
        let text_body = response
            .text()
            .await
            .map_err(|e| self.provider_error(format!("network error: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(self.provider_error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                sanitize_api_error(&text_body)
            )));
        }

        let raw: serde_json::Value = serde_json::from_str(&text_body)
            .map_err(|e| self.provider_error(format!("invalid response: {e}")))?;
        let parsed: ChatResponse = serde_json::from_value(raw.clone())
            .map_err(|e| self.provider_error(format!("invalid response: {e}")))?;

        let (text, input_tokens, output_tokens) =
            extract_chat_response(Backend::OpenAi, parsed, request)?;
        let cost_usd = self
            .pricing
            .estimate_cost(&self.config.model, input_tokens, output_tokens);

        Ok(Completion {
            text,
            backend: Backend::OpenAi,
            model: self.config.model.clone(),
            input_tokens,
            output_tokens,
            latency_ms,
            cost_usd,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chat_request_with_system_prompt() {
        let request = CompletionRequest::new("hello").with_system_prompt("be brief");
        let body = serde_json::to_value(build_chat_request("gpt-4o-mini", &request)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_build_chat_request_without_system_prompt() {
        let request = CompletionRequest::new("hello");
        let body = serde_json::to_value(build_chat_request("gpt-4o-mini", &request)).unwrap();

        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_build_chat_request_json_mode() {
        let request = CompletionRequest::new("hello").with_json_mode(true);
        let body = serde_json::to_value(build_chat_request("gpt-4o-mini", &request)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_extract_chat_response_reported_usage() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "hi"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2}
        }))
        .unwrap();

        let request = CompletionRequest::new("hello");
        let (text, input, output) =
            extract_chat_response(Backend::OpenAi, response, &request).unwrap();
        assert_eq!(text, "hi");
        assert_eq!(input, 9);
        assert_eq!(output, 2);
    }

    #[test]
    fn test_extract_chat_response_estimates_when_usage_missing() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "z".repeat(20)}}]
        }))
        .unwrap();

        let request = CompletionRequest::new("y".repeat(40));
        let (_, input, output) =
            extract_chat_response(Backend::OpenAi, response, &request).unwrap();
        assert_eq!(input, 10);
        assert_eq!(output, 5);
    }

    #[test]
    fn test_extract_chat_response_no_choices_is_error() {
        let response: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        let request = CompletionRequest::new("hello");
        assert!(extract_chat_response(Backend::OpenAi, response, &request).is_err());
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = OpenAiConfig::new("sk-1234567890abcdef");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("34567890"));
    }
}
