//! Google Gemini provider adapter
//!
//! Speaks the generateContent API. Authentication is an API key passed as
//! a URL query parameter; JSON mode is requested through
//! `generationConfig.responseMimeType`.

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

/// Gemini API base URL
pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Available Gemini models
pub const MODELS: &[&str] = &[
    "gemini-2.5-flash-lite",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
];

/// Default Gemini model (cheap and fast)
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini adapter configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
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
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::NotConfigured("GEMINI_API_KEY not set".to_string()))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

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
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: u32,
    /// May be absent for empty responses
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

/// Google Gemini adapter
pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
    pricing: Arc<CostModel>,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter
    pub fn new(config: GeminiConfig, pricing: Arc<CostModel>) -> Result<Self> {
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

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system_prompt.as_ref().map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: text.clone() }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request
                    .json_mode
                    .then(|| "application/json".to_string()),
            },
        }
    }

    fn provider_error(&self, message: String) -> Error {
        Error::Provider {
            backend: Backend::Gemini,
            message,
        }
    }

    fn extract(&self, response: GeminiResponse, request: &CompletionRequest) -> Result<(String, u32, u32)> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| self.provider_error("no candidates in response".to_string()))?;

        let text = candidate
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let (input_tokens, output_tokens) = match response.usage_metadata {
            Some(usage) => (
                usage.prompt_token_count,
                usage
                    .candidates_token_count
                    .unwrap_or_else(|| estimate_tokens(&text)),
            ),
            None => (estimate_tokens(&request.prompt), estimate_tokens(&text)),
        };

        Ok((text, input_tokens, output_tokens))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn backend(&self) -> Backend {
        Backend::Gemini
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );
        let body = self.build_request(request);

        debug!("sending request to Gemini");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
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
        let parsed: GeminiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| self.provider_error(format!("invalid response: {e}")))?;

        let (text, input_tokens, output_tokens) = self.extract(parsed, request)?;
        let cost_usd = self
            .pricing
            .estimate_cost(&self.config.model, input_tokens, output_tokens);

        Ok(Completion {
            text,
            backend: Backend::Gemini,
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

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new(GeminiConfig::new("test-key-12345678"), Arc::new(CostModel::new()))
            .unwrap()
    }

    #[test]
    fn test_build_request_shape() {
        let request = CompletionRequest::new("hello")
            .with_system_prompt("be brief")
            .with_temperature(0.5)
            .with_max_tokens(512);

        let body = serde_json::to_value(adapter().build_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_build_request_json_mode_sets_mime_type() {
        let request = CompletionRequest::new("hello").with_json_mode(true);
        let body = serde_json::to_value(adapter().build_request(&request)).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_extract_uses_reported_usage() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hi "}, {"text": "there"}]}
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3}
        }))
        .unwrap();

        let request = CompletionRequest::new("hello");
        let (text, input, output) = adapter().extract(response, &request).unwrap();
        assert_eq!(text, "hi there");
        assert_eq!(input, 7);
        assert_eq!(output, 3);
    }

    #[test]
    fn test_extract_falls_back_to_estimates() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "x".repeat(40)}]}
            }]
        }))
        .unwrap();

        let request = CompletionRequest::new("y".repeat(80));
        let (_, input, output) = adapter().extract(response, &request).unwrap();
        assert_eq!(input, 20);
        assert_eq!(output, 10);
    }

    #[test]
    fn test_extract_no_candidates_is_error() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let request = CompletionRequest::new("hello");
        assert!(adapter().extract(response, &request).is_err());
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = GeminiConfig::new("AIza1234567890abcdef");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("1234567890ab"));
    }
}
