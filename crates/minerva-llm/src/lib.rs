//! Provider-agnostic LLM completion client.
//!
//! One [`LlmClient`] fronts several hosted model backends (Gemini, OpenAI,
//! Anthropic, OpenRouter) behind a single [`LlmClient::complete`] call.
//! The client enforces per-backend sliding-window rate limits and a daily
//! cost budget, fails over across backends in a configurable order, and
//! keeps per-backend usage counters for reporting.
//!
//! # Example
//!
//! ```no_run
//! use minerva_llm::{CompletionRequest, LlmClient};
//!
//! # async fn run() -> minerva_llm::Result<()> {
//! let client = LlmClient::from_env()?;
//! let completion = client
//!     .complete(CompletionRequest::new("Summarize this in one line.").with_max_tokens(64))
//!     .await?;
//! println!("{} (${:.4})", completion.text, completion.cost_usd);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod client;
pub mod completion;
pub mod error;
pub mod limiter;
pub mod pricing;
pub mod providers;
pub mod stats;
pub mod token;
pub mod util;

pub use budget::BudgetTracker;
pub use client::{BackendConfig, ClientConfig, LlmClient};
pub use completion::{Completion, CompletionRequest};
pub use error::{Attempt, Error, Result};
pub use limiter::RateLimiter;
pub use pricing::{default_pricing, CostModel, ModelPricing};
pub use providers::{
    AnthropicAdapter, AnthropicConfig, Backend, GeminiAdapter, GeminiConfig, MockAdapter,
    OpenAiAdapter, OpenAiConfig, OpenRouterAdapter, OpenRouterConfig, ProviderAdapter,
    ALL_BACKENDS,
};
pub use stats::{BackendSnapshot, UsageReport, UsageStatsRegistry};
pub use token::estimate_tokens;
