//! Error types for minerva-llm

use crate::providers::Backend;
use thiserror::Error;

/// Outcome of one backend attempt that did not produce a response.
///
/// Collected by the client while walking the fallback chain and carried
/// by [`Error::AllBackendsFailed`] so callers can see why every backend
/// was skipped or failed.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Backend that was attempted or skipped
    pub backend: Backend,
    /// Failure or skip reason
    pub reason: String,
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.reason)
    }
}

/// LLM client error type
#[derive(Debug, Error)]
pub enum Error {
    /// No backend has credentials configured
    #[error("no backends configured")]
    NoBackendsConfigured,

    /// Daily budget cap reached before any backend was attempted
    #[error("daily budget exceeded: spent ${spent_usd:.4} of ${budget_usd:.2}")]
    BudgetExceeded {
        /// Cumulative spend for the current day
        spent_usd: f64,
        /// Configured daily cap
        budget_usd: f64,
    },

    /// A single backend call failed (transport, non-2xx status, or
    /// unparseable body). Non-fatal to the overall call; the client
    /// converts it into fallback continuation.
    #[error("{backend} provider error: {message}")]
    Provider {
        /// Backend the failure is scoped to
        backend: Backend,
        /// Sanitized failure description
        message: String,
    },

    /// Every candidate backend was skipped or failed
    #[error("all backends failed: {}", format_attempts(attempts))]
    AllBackendsFailed {
        /// One entry per candidate, in attempt order
        attempts: Vec<Attempt>,
    },

    /// Missing configuration (e.g. environment variable not set)
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// HTTP client construction failed
    #[error("network error: {0}")]
    Network(String),
}

fn format_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_backends_failed_display_lists_every_attempt() {
        let err = Error::AllBackendsFailed {
            attempts: vec![
                Attempt {
                    backend: Backend::Gemini,
                    reason: "HTTP 500".to_string(),
                },
                Attempt {
                    backend: Backend::Anthropic,
                    reason: "rate limited".to_string(),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.contains("gemini: HTTP 500"));
        assert!(text.contains("anthropic: rate limited"));
    }

    #[test]
    fn test_budget_exceeded_display() {
        let err = Error::BudgetExceeded {
            spent_usd: 1.23456,
            budget_usd: 1.0,
        };
        assert!(err.to_string().contains("$1.2346"));
        assert!(err.to_string().contains("$1.00"));
    }
}
