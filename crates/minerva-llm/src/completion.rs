//! Canonical completion request and response types
//!
//! All provider adapters translate between these vendor-neutral shapes and
//! their vendor's wire format.

use crate::providers::Backend;
use crate::token::estimate_tokens;
use serde::{Deserialize, Serialize};

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default completion token cap
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// A vendor-neutral completion request.
///
/// Immutable for the duration of one [`crate::client::LlmClient::complete`]
/// call; adapters borrow it and never mutate it.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User prompt
    pub prompt: String,
    /// Optional system prompt (placement is vendor-specific)
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Ask the vendor for JSON-only output (mechanics differ per vendor)
    pub json_mode: bool,
    /// Force a specific backend, bypassing the fallback chain
    pub backend: Option<Backend>,
}

impl CompletionRequest {
    /// Create a request with default temperature and token cap
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            json_mode: false,
            backend: None,
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token cap
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request JSON-only output
    #[must_use]
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    /// Force a specific backend
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Token volume this request may consume, for rate-limit admission.
    ///
    /// Prompt and system prompt are estimated at ~4 chars per token; the
    /// completion side is assumed to use the full `max_tokens` allowance.
    #[must_use]
    pub fn estimated_tokens(&self) -> u32 {
        let prompt_tokens = estimate_tokens(&self.prompt);
        let system_tokens = self
            .system_prompt
            .as_deref()
            .map(estimate_tokens)
            .unwrap_or(0);
        prompt_tokens + system_tokens + self.max_tokens
    }
}

/// A vendor-neutral completion response.
///
/// Created once per successful adapter call and owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Backend that served the request
    pub backend: Backend,
    /// Model that served the request
    pub model: String,
    /// Prompt-side token count (vendor-reported or estimated)
    pub input_tokens: u32,
    /// Completion-side token count (vendor-reported or estimated)
    pub output_tokens: u32,
    /// Wall-clock latency of the HTTP exchange
    pub latency_ms: u64,
    /// Estimated cost of this call in USD
    pub cost_usd: f64,
    /// Raw vendor payload, kept for debugging
    pub raw: serde_json::Value,
}

impl Completion {
    /// Total tokens consumed by this call
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new("hello");
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!request.json_mode);
        assert!(request.system_prompt.is_none());
        assert!(request.backend.is_none());
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("hello")
            .with_system_prompt("be brief")
            .with_temperature(0.7)
            .with_max_tokens(256)
            .with_json_mode(true)
            .with_backend(Backend::Anthropic);

        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 256);
        assert!(request.json_mode);
        assert_eq!(request.backend, Some(Backend::Anthropic));
    }

    #[test]
    fn test_estimated_tokens_includes_completion_allowance() {
        let request = CompletionRequest::new("a".repeat(400)).with_max_tokens(100);
        assert_eq!(request.estimated_tokens(), 200);

        let with_system = request.with_system_prompt("b".repeat(40));
        assert_eq!(with_system.estimated_tokens(), 210);
    }

    #[test]
    fn test_total_tokens() {
        let completion = Completion {
            text: "ok".to_string(),
            backend: Backend::Gemini,
            model: "gemini-2.5-flash".to_string(),
            input_tokens: 12,
            output_tokens: 30,
            latency_ms: 250,
            cost_usd: 0.0001,
            raw: serde_json::Value::Null,
        };
        assert_eq!(completion.total_tokens(), 42);
    }
}
