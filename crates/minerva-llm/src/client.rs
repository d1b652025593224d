//! LLM client with ordered failover
//!
//! Composes the provider adapters, per-backend rate limiters, the daily
//! budget tracker and the usage registry behind a single `complete()`
//! call. Backends are tried strictly in order, each at most once per
//! request; there is no retry against the same backend.

use crate::budget::BudgetTracker;
use crate::completion::{Completion, CompletionRequest};
use crate::error::{Attempt, Error, Result};
use crate::limiter::RateLimiter;
use crate::pricing::CostModel;
use crate::providers::{
    AnthropicAdapter, AnthropicConfig, Backend, GeminiAdapter, GeminiConfig, OpenAiAdapter,
    OpenAiConfig, OpenRouterAdapter, OpenRouterConfig, ProviderAdapter, ALL_BACKENDS,
};
use crate::stats::{BackendSnapshot, UsageReport, UsageStatsRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default daily budget cap (USD)
pub const DEFAULT_DAILY_BUDGET_USD: f64 = 5.0;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default request cap per backend per minute
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default token cap per backend per minute
pub const DEFAULT_TOKENS_PER_MINUTE: u32 = 90_000;

/// Per-backend configuration. Presence of an entry enables the backend.
#[derive(Clone)]
pub struct BackendConfig {
    /// API key
    pub api_key: String,
    /// Model override (backend default when `None`)
    pub model: Option<String>,
    /// Request timeout override (client default when `None`)
    pub timeout: Option<Duration>,
    /// Request cap per minute
    pub requests_per_minute: u32,
    /// Token cap per minute
    pub tokens_per_minute: u32,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &crate::util::mask_api_key(&self.api_key))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("tokens_per_minute", &self.tokens_per_minute)
            .finish()
    }
}

impl BackendConfig {
    /// Create a configuration with an API key and default limits
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            timeout: None,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            tokens_per_minute: DEFAULT_TOKENS_PER_MINUTE,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the request cap per minute
    #[must_use]
    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Set the token cap per minute
    #[must_use]
    pub fn with_tokens_per_minute(mut self, tokens_per_minute: u32) -> Self {
        self.tokens_per_minute = tokens_per_minute;
        self
    }
}

/// Client-wide configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-backend entries; an absent backend is disabled
    pub backends: HashMap<Backend, BackendConfig>,
    /// Backend tried first (configuration choice, not a computed ranking)
    pub primary: Option<Backend>,
    /// Fallback priority; defaults to [`ALL_BACKENDS`] order
    pub fallback_order: Option<Vec<Backend>>,
    /// Daily budget cap (USD)
    pub daily_budget_usd: f64,
    /// Timeout for backends without their own override
    pub default_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Create an empty configuration with default budget and timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            primary: None,
            fallback_order: None,
            daily_budget_usd: DEFAULT_DAILY_BUDGET_USD,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Enable a backend
    #[must_use]
    pub fn with_backend(mut self, backend: Backend, config: BackendConfig) -> Self {
        self.backends.insert(backend, config);
        self
    }

    /// Set the primary backend
    #[must_use]
    pub fn with_primary(mut self, backend: Backend) -> Self {
        self.primary = Some(backend);
        self
    }

    /// Set an explicit fallback priority
    #[must_use]
    pub fn with_fallback_order(mut self, order: Vec<Backend>) -> Self {
        self.fallback_order = Some(order);
        self
    }

    /// Set the daily budget cap (USD)
    #[must_use]
    pub fn with_daily_budget_usd(mut self, budget: f64) -> Self {
        self.daily_budget_usd = budget;
        self
    }

    /// Set the default timeout
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Build a configuration from environment variables.
    ///
    /// Reads `GEMINI_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and
    /// `OPENROUTER_API_KEY` (each optional), per-backend `*_MODEL`
    /// overrides, `LLM_PRIMARY_BACKEND` and `LLM_DAILY_BUDGET_USD`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();

        for backend in ALL_BACKENDS {
            if let Ok(api_key) = std::env::var(env_key(*backend)) {
                let mut backend_config = BackendConfig::new(api_key);
                if let Ok(model) = std::env::var(env_model_key(*backend)) {
                    backend_config = backend_config.with_model(model);
                }
                config.backends.insert(*backend, backend_config);
            }
        }

        if let Ok(primary) = std::env::var("LLM_PRIMARY_BACKEND") {
            match primary.parse::<Backend>() {
                Ok(backend) => config.primary = Some(backend),
                Err(e) => warn!("ignoring LLM_PRIMARY_BACKEND: {e}"),
            }
        }

        if let Ok(budget) = std::env::var("LLM_DAILY_BUDGET_USD") {
            match budget.parse::<f64>() {
                Ok(value) => config.daily_budget_usd = value,
                Err(_) => warn!("ignoring non-numeric LLM_DAILY_BUDGET_USD"),
            }
        }

        config
    }
}

fn env_key(backend: Backend) -> &'static str {
    match backend {
        Backend::Gemini => "GEMINI_API_KEY",
        Backend::OpenAi => "OPENAI_API_KEY",
        Backend::Anthropic => "ANTHROPIC_API_KEY",
        Backend::OpenRouter => "OPENROUTER_API_KEY",
    }
}

fn env_model_key(backend: Backend) -> &'static str {
    match backend {
        Backend::Gemini => "GEMINI_MODEL",
        Backend::OpenAi => "OPENAI_MODEL",
        Backend::Anthropic => "ANTHROPIC_MODEL",
        Backend::OpenRouter => "OPENROUTER_MODEL",
    }
}

/// Multi-backend LLM client.
///
/// One instance is constructed at startup and shared (behind an `Arc`) by
/// every request handler; all internal state is guarded for concurrent
/// use.
pub struct LlmClient {
    adapters: HashMap<Backend, Arc<dyn ProviderAdapter>>,
    limiters: HashMap<Backend, RateLimiter>,
    budget: BudgetTracker,
    stats: UsageStatsRegistry,
    primary: Option<Backend>,
    /// Configured backends in fallback priority (primary not yet applied)
    order: Vec<Backend>,
}

impl LlmClient {
    /// Build a client from configuration.
    ///
    /// Constructs one adapter and one rate limiter per configured
    /// backend. A configuration with zero backends is valid; `complete`
    /// then fails with [`Error::NoBackendsConfigured`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        let pricing = Arc::new(CostModel::new());
        let mut adapters: HashMap<Backend, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut limiters = HashMap::new();

        for (backend, backend_config) in &config.backends {
            let model = backend_config
                .model
                .clone()
                .unwrap_or_else(|| backend.default_model().to_string());
            let timeout = backend_config.timeout.unwrap_or(config.default_timeout);

            let adapter: Arc<dyn ProviderAdapter> = match backend {
                Backend::Gemini => Arc::new(GeminiAdapter::new(
                    GeminiConfig::new(&backend_config.api_key)
                        .with_model(model)
                        .with_timeout(timeout),
                    Arc::clone(&pricing),
                )?),
                Backend::OpenAi => Arc::new(OpenAiAdapter::new(
                    OpenAiConfig::new(&backend_config.api_key)
                        .with_model(model)
                        .with_timeout(timeout),
                    Arc::clone(&pricing),
                )?),
                Backend::Anthropic => Arc::new(AnthropicAdapter::new(
                    AnthropicConfig::new(&backend_config.api_key)
                        .with_model(model)
                        .with_timeout(timeout),
                    Arc::clone(&pricing),
                )?),
                Backend::OpenRouter => Arc::new(OpenRouterAdapter::new(
                    OpenRouterConfig::new(&backend_config.api_key)
                        .with_model(model)
                        .with_timeout(timeout),
                    Arc::clone(&pricing),
                )?),
            };

            adapters.insert(*backend, adapter);
            limiters.insert(
                *backend,
                RateLimiter::new(
                    backend_config.requests_per_minute,
                    backend_config.tokens_per_minute,
                ),
            );
        }

        let order = build_order(&config, &adapters);
        let tracked: Vec<Backend> = order.clone();
        info!(backends = ?tracked, primary = ?config.primary, "LLM client configured");

        Ok(Self {
            adapters,
            limiters,
            budget: BudgetTracker::new(config.daily_budget_usd),
            stats: UsageStatsRegistry::new(&tracked),
            primary: config.primary,
            order,
        })
    }

    /// Build a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Register a custom adapter with its rate limiter.
    ///
    /// Replaces any existing adapter for the same backend and appends
    /// the backend to the fallback order if it is not present.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>, limiter: RateLimiter) {
        let backend = adapter.backend();
        debug!(%backend, "registering adapter");
        self.adapters.insert(backend, adapter);
        self.limiters.insert(backend, limiter);
        self.stats.track(backend);
        if !self.order.contains(&backend) {
            self.order.push(backend);
        }
    }

    /// Backends currently configured, in fallback priority
    #[must_use]
    pub fn configured_backends(&self) -> Vec<Backend> {
        self.order.clone()
    }

    /// Complete a prompt against the first healthy backend.
    ///
    /// Order: a configured override backend is tried alone; otherwise the
    /// primary backend first, then the remaining configured backends in
    /// fallback priority. Each candidate is tried at most once.
    #[instrument(skip(self, request), fields(json_mode = request.json_mode))]
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        if self.adapters.is_empty() {
            return Err(Error::NoBackendsConfigured);
        }

        if !self.budget.check() {
            return Err(Error::BudgetExceeded {
                spent_usd: self.budget.spent_today(),
                budget_usd: self.budget.daily_budget_usd(),
            });
        }

        let candidates = self.candidate_order(&request);
        let estimated_tokens = request.estimated_tokens();
        let mut attempts: Vec<Attempt> = Vec::new();

        for backend in candidates {
            let (Some(adapter), Some(limiter)) =
                (self.adapters.get(&backend), self.limiters.get(&backend))
            else {
                continue;
            };

            if !limiter.can_request(estimated_tokens) {
                let wait = limiter.wait_time();
                debug!(%backend, wait_secs = wait.as_secs_f64(), "rate limited, skipping");
                attempts.push(Attempt {
                    backend,
                    reason: format!("rate limited (retry in {:.0}s)", wait.as_secs_f64().ceil()),
                });
                continue;
            }

            match adapter.complete(&request).await {
                Ok(completion) => {
                    self.stats.record_success(
                        backend,
                        completion.input_tokens,
                        completion.output_tokens,
                        completion.cost_usd,
                        completion.latency_ms,
                    );
                    limiter.record_request(completion.total_tokens());
                    self.budget.record_cost(completion.cost_usd);

                    if !attempts.is_empty() {
                        info!(%backend, skipped = attempts.len(), "completed after fallback");
                    }
                    return Ok(completion);
                }
                Err(e) => {
                    self.stats.record_error(backend);
                    warn!(%backend, error = %e, "backend failed, trying next");
                    attempts.push(Attempt {
                        backend,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(Error::AllBackendsFailed { attempts })
    }

    fn candidate_order(&self, request: &CompletionRequest) -> Vec<Backend> {
        if let Some(backend) = request.backend {
            if self.adapters.contains_key(&backend) {
                return vec![backend];
            }
            warn!(%backend, "override backend not configured, using fallback chain");
        }

        let mut order = self.order.clone();
        if let Some(primary) = self.primary {
            if let Some(pos) = order.iter().position(|b| *b == primary) {
                let primary = order.remove(pos);
                order.insert(0, primary);
            }
        }
        order
    }

    /// Snapshot one backend's usage counters
    #[must_use]
    pub fn backend_stats(&self, backend: Backend) -> Option<BackendSnapshot> {
        self.stats.snapshot(backend)
    }

    /// Aggregate usage report: daily spend, cap, and all backend snapshots
    #[must_use]
    pub fn usage_report(&self) -> UsageReport {
        UsageReport {
            daily_cost_usd: self.budget.spent_today(),
            daily_budget_usd: self.budget.daily_budget_usd(),
            backends: self.stats.snapshots(),
        }
    }
}

/// Configured backends in fallback priority: the explicit order if given
/// (default priority otherwise), restricted to configured backends, with
/// any configured stragglers appended in default priority.
fn build_order(
    config: &ClientConfig,
    adapters: &HashMap<Backend, Arc<dyn ProviderAdapter>>,
) -> Vec<Backend> {
    let base: Vec<Backend> = config
        .fallback_order
        .clone()
        .unwrap_or_else(|| ALL_BACKENDS.to_vec());

    let mut order: Vec<Backend> = base
        .into_iter()
        .filter(|b| adapters.contains_key(b))
        .collect();

    for backend in ALL_BACKENDS {
        if adapters.contains_key(backend) && !order.contains(backend) {
            order.push(*backend);
        }
    }
    order
}
