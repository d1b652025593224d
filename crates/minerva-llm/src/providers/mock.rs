//! Mock provider adapter for testing
//!
//! Returns queued completions or a default canned one, or fails every
//! call with a fixed message. Counts calls so tests can assert that no
//! network-equivalent work happened.

use super::{Backend, ProviderAdapter};
use crate::completion::{Completion, CompletionRequest};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A mock adapter for exercising the client without network access.
pub struct MockAdapter {
    backend: Backend,
    model: String,
    fail_message: Option<String>,
    default_cost_usd: f64,
    replies: Mutex<VecDeque<Completion>>,
    calls: AtomicU64,
}

impl MockAdapter {
    /// Create a mock that serves canned completions for `backend`
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            model: "mock-model".to_string(),
            fail_message: None,
            default_cost_usd: 0.001,
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Create a mock whose every call fails with the given message
    #[must_use]
    pub fn failing(backend: Backend, message: impl Into<String>) -> Self {
        let mut mock = Self::new(backend);
        mock.fail_message = Some(message.into());
        mock
    }

    /// Set the cost reported by canned completions
    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.default_cost_usd = cost_usd;
        self
    }

    /// Queue a completion with the given text
    pub fn queue_text(&self, text: impl Into<String>) {
        let completion = self.canned(text.into());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(completion);
    }

    /// Number of `complete` calls received
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn canned(&self, text: String) -> Completion {
        Completion {
            text,
            backend: self.backend,
            model: self.model.clone(),
            input_tokens: 8,
            output_tokens: 4,
            latency_ms: 5,
            cost_usd: self.default_cost_usd,
            raw: serde_json::Value::Null,
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for MockAdapter {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_message {
            return Err(Error::Provider {
                backend: self.backend,
                message: message.clone(),
            });
        }

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(queued.unwrap_or_else(|| self.canned("mock response".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_queued_then_default() {
        let mock = MockAdapter::new(Backend::Gemini);
        mock.queue_text("first");

        let request = CompletionRequest::new("hi");
        assert_eq!(mock.complete(&request).await.unwrap().text, "first");
        assert_eq!(mock.complete(&request).await.unwrap().text, "mock response");
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_mock_fails_every_call() {
        let mock = MockAdapter::failing(Backend::OpenAi, "boom");
        let request = CompletionRequest::new("hi");

        let err = mock.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(mock.calls(), 1);
    }
}
