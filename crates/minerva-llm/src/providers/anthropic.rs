//! Anthropic provider adapter
//!
//! Speaks the messages API. The system prompt goes in a top-level `system`
//! field rather than a message, and the API has no structured JSON-mode
//! flag, so JSON-only output is requested by appending an explicit
//! instruction to the user message.

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

/// Anthropic API version header value
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic API base URL
pub const BASE_URL: &str = "https://api.anthropic.com";

/// Available Anthropic models
pub const MODELS: &[&str] = &["claude-3-5-haiku-20241022", "claude-sonnet-4-20250514"];

/// Default Anthropic model (cheapest of the family)
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Instruction appended to the user message when JSON output is requested
const JSON_MODE_INSTRUCTION: &str =
    "Respond with valid JSON only, with no markdown fences or commentary.";

/// Anthropic adapter configuration
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
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
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::NotConfigured("ANTHROPIC_API_KEY not set".to_string()))?;
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

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

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic adapter
pub struct AnthropicAdapter {
    client: Client,
    config: AnthropicConfig,
    pricing: Arc<CostModel>,
}

impl AnthropicAdapter {
    /// Create a new Anthropic adapter
    pub fn new(config: AnthropicConfig, pricing: Arc<CostModel>) -> Result<Self> {
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

    fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        // No structured JSON mode; the instruction rides on the user message
        let content = if request.json_mode {
            format!("{}\n\n{}", request.prompt, JSON_MODE_INSTRUCTION)
        } else {
            request.prompt.clone()
        };

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system_prompt.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: request.temperature,
        }
    }

    fn provider_error(&self, message: String) -> Error {
        Error::Provider {
            backend: Backend::Anthropic,
            message,
        }
    }

    fn extract(
        &self,
        response: AnthropicResponse,
        request: &CompletionRequest,
    ) -> Result<(String, u32, u32)> {
        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() && response.content.is_empty() {
            return Err(self.provider_error("no content in response".to_string()));
        }

        let (input_tokens, output_tokens) = match response.usage {
            Some(usage) => (usage.input_tokens, usage.output_tokens),
            None => (estimate_tokens(&request.prompt), estimate_tokens(&text)),
        };

        Ok((text, input_tokens, output_tokens))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn backend(&self) -> Backend {
        Backend::Anthropic
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = self.build_request(request);

        debug!("sending request to Anthropic");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
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
        let parsed: AnthropicResponse = serde_json::from_value(raw.clone())
            .map_err(|e| self.provider_error(format!("invalid response: {e}")))?;

        let (text, input_tokens, output_tokens) = self.extract(parsed, request)?;
        let cost_usd = self
            .pricing
            .estimate_cost(&self.config.model, input_tokens, output_tokens);

        Ok(Completion {
            text,
            backend: Backend::Anthropic,
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

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            AnthropicConfig::new("test-key-12345678"),
            Arc::new(CostModel::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_build_request_system_is_top_level() {
        let request = CompletionRequest::new("hello").with_system_prompt("be brief");
        let body = serde_json::to_value(adapter().build_request(&request)).unwrap();

        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_build_request_json_mode_appends_instruction() {
        let request = CompletionRequest::new("list my tasks").with_json_mode(true);
        let body = serde_json::to_value(adapter().build_request(&request)).unwrap();

        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with("list my tasks"));
        assert!(content.contains("valid JSON only"));
    }

    #[test]
    fn test_extract_joins_text_blocks() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "hello "},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "usage": {"input_tokens": 11, "output_tokens": 4}
        }))
        .unwrap();

        let request = CompletionRequest::new("hi");
        let (text, input, output) = adapter().extract(response, &request).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(input, 11);
        assert_eq!(output, 4);
    }

    #[test]
    fn test_extract_estimates_when_usage_missing() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "w".repeat(16)}]
        }))
        .unwrap();

        let request = CompletionRequest::new("v".repeat(24));
        let (_, input, output) = adapter().extract(response, &request).unwrap();
        assert_eq!(input, 6);
        assert_eq!(output, 4);
    }

    #[test]
    fn test_extract_empty_content_is_error() {
        let response: AnthropicResponse =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        let request = CompletionRequest::new("hi");
        assert!(adapter().extract(response, &request).is_err());
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = AnthropicConfig::new("sk-ant-1234567890abcdef");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("1234567890"));
    }
}
