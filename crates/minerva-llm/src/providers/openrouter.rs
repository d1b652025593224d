//! OpenRouter provider adapter
//!
//! OpenAI-compatible aggregator: request and response shapes are identical
//! to the OpenAI adapter (and shared with it), with bearer authentication
//! plus an `X-Title` attribution header.

use super::openai::{build_chat_request, extract_chat_response, ChatResponse};
use super::{Backend, ProviderAdapter};
use crate::completion::{Completion, CompletionRequest};
use crate::error::{Error, Result};
use crate::pricing::CostModel;
use crate::util::{mask_api_key, sanitize_api_error};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// OpenRouter API base URL
pub const BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Popular OpenRouter models (subset)
pub const MODELS: &[&str] = &[
    "meta-llama/llama-3.1-70b-instruct",
    "google/gemini-flash-1.5",
    "openai/gpt-4o-mini",
];

/// Default OpenRouter model
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-70b-instruct";

/// Default `X-Title` attribution value
const DEFAULT_APP_TITLE: &str = "minerva";

/// OpenRouter adapter configuration
#[derive(Clone)]
pub struct OpenRouterConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// App title (for OpenRouter analytics)
    pub app_title: String,
}

impl fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("app_title", &self.app_title)
            .finish()
    }
}

impl OpenRouterConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            app_title: DEFAULT_APP_TITLE.to_string(),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::NotConfigured("OPENROUTER_API_KEY not set".to_string()))?;
        let model = std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model,
            timeout: Duration::from_secs(60),
            app_title: DEFAULT_APP_TITLE.to_string(),
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

    /// Set the `X-Title` attribution value
    #[must_use]
    pub fn with_app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = title.into();
        self
    }
}

/// OpenRouter adapter
pub struct OpenRouterAdapter {
    client: Client,
    config: OpenRouterConfig,
    pricing: Arc<CostModel>,
}

impl OpenRouterAdapter {
    /// Create a new OpenRouter adapter
    pub fn new(config: OpenRouterConfig, pricing: Arc<CostModel>) -> Result<Self> {
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
            backend: Backend::OpenRouter,
            message,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn backend(&self) -> Backend {
        Backend::OpenRouter
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = build_chat_request(&self.config.model, request);

        debug!("sending request to OpenRouter");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("X-Title", &self.config.app_title)
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
            extract_chat_response(Backend::OpenRouter, parsed, request)?;
        let cost_usd = self
            .pricing
            .estimate_cost(&self.config.model, input_tokens, output_tokens);

        Ok(Completion {
            text,
            backend: Backend::OpenRouter,
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
    fn test_config_defaults() {
        let config = OpenRouterConfig::new("or-key-12345678");
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.app_title, "minerva");
    }

    #[test]
    fn test_config_builder() {
        let config = OpenRouterConfig::new("or-key-12345678")
            .with_model("google/gemini-flash-1.5")
            .with_app_title("my-bot")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.model, "google/gemini-flash-1.5");
        assert_eq!(config.app_title, "my-bot");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = OpenRouterConfig::new("sk-or-1234567890abcdef");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("1234567890"));
    }
}
