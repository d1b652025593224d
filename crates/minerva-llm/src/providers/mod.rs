//! Provider adapters
//!
//! One adapter per vendor family, all translating between the canonical
//! request/response types and the vendor's wire format:
//! - Gemini: Google generateContent API (key as query parameter)
//! - OpenAI: chat completions API (bearer auth)
//! - Anthropic: messages API (x-api-key + version headers)
//! - OpenRouter: OpenAI-compatible aggregator (bearer auth + title header)

use crate::completion::{Completion, CompletionRequest};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod openrouter;

pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use gemini::{GeminiAdapter, GeminiConfig};
pub use mock::MockAdapter;
pub use openai::{OpenAiAdapter, OpenAiConfig};
pub use openrouter::{OpenRouterAdapter, OpenRouterConfig};

/// The closed set of supported vendor families.
///
/// Each configured backend owns exactly one rate limiter and one usage
/// stats record for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Gemini content-generation API
    Gemini,
    /// OpenAI chat-completions API
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// OpenRouter multi-provider aggregator
    #[serde(rename = "openrouter")]
    OpenRouter,
}

/// All backends, in the default fallback priority (cheapest first)
pub const ALL_BACKENDS: &[Backend] = &[
    Backend::Gemini,
    Backend::OpenAi,
    Backend::Anthropic,
    Backend::OpenRouter,
];

impl Backend {
    /// Returns the string tag for this backend
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
        }
    }

    /// The model used when no override is configured
    #[must_use]
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => gemini::DEFAULT_MODEL,
            Self::OpenAi => openai::DEFAULT_MODEL,
            Self::Anthropic => anthropic::DEFAULT_MODEL,
            Self::OpenRouter => openrouter::DEFAULT_MODEL,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Trait implemented by every vendor adapter.
///
/// Adapters are stateless apart from their immutable configuration; one
/// `complete` call performs exactly one HTTP exchange.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which backend this adapter serves
    fn backend(&self) -> Backend;

    /// The configured model identifier
    fn model(&self) -> &str;

    /// Translate the canonical request, perform the vendor call, and
    /// translate the response back.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
