//! Per-backend usage statistics
//!
//! Monotonically increasing counters, reset only by process restart.

use crate::providers::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default, Clone)]
struct BackendStats {
    requests: u64,
    input_tokens: u64,
    output_tokens: u64,
    cost_usd: f64,
    total_latency_ms: u64,
    errors: u64,
    last_request: Option<DateTime<Utc>>,
}

/// Point-in-time view of one backend's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSnapshot {
    /// Backend these counters belong to
    pub backend: Backend,
    /// Successful requests served
    pub requests: u64,
    /// Cumulative prompt-side tokens
    pub input_tokens: u64,
    /// Cumulative completion-side tokens
    pub output_tokens: u64,
    /// Cumulative estimated cost (USD)
    pub cost_usd: f64,
    /// Average latency per successful request, 0 when none
    pub avg_latency_ms: f64,
    /// Failed attempts
    pub errors: u64,
    /// When the backend last served a request
    pub last_request: Option<DateTime<Utc>>,
}

/// Aggregate view across all backends plus the budget position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// Cumulative spend for the current day (USD)
    pub daily_cost_usd: f64,
    /// Configured daily cap (USD)
    pub daily_budget_usd: f64,
    /// Per-backend snapshots
    pub backends: HashMap<Backend, BackendSnapshot>,
}

/// Registry of per-backend usage counters.
///
/// One record per configured backend, created at client construction and
/// living for the process lifetime.
#[derive(Debug)]
pub struct UsageStatsRegistry {
    backends: Mutex<HashMap<Backend, BackendStats>>,
}

impl UsageStatsRegistry {
    /// Create a registry with a zeroed record per backend
    #[must_use]
    pub fn new(backends: &[Backend]) -> Self {
        let map = backends
            .iter()
            .map(|b| (*b, BackendStats::default()))
            .collect();
        Self {
            backends: Mutex::new(map),
        }
    }

    /// Start tracking a backend with zeroed counters (no-op if tracked)
    pub fn track(&self, backend: Backend) {
        self.lock().entry(backend).or_default();
    }

    /// Record a successful call
    pub fn record_success(
        &self,
        backend: Backend,
        input_tokens: u32,
        output_tokens: u32,
        cost_usd: f64,
        latency_ms: u64,
    ) {
        let mut map = self.lock();
        let stats = map.entry(backend).or_default();
        stats.requests += 1;
        stats.input_tokens += u64::from(input_tokens);
        stats.output_tokens += u64::from(output_tokens);
        stats.cost_usd += cost_usd;
        stats.total_latency_ms += latency_ms;
        stats.last_request = Some(Utc::now());
    }

    /// Record a failed attempt
    pub fn record_error(&self, backend: Backend) {
        let mut map = self.lock();
        map.entry(backend).or_default().errors += 1;
    }

    /// Snapshot one backend's counters, if it is tracked
    #[must_use]
    pub fn snapshot(&self, backend: Backend) -> Option<BackendSnapshot> {
        self.lock()
            .get(&backend)
            .map(|stats| make_snapshot(backend, stats))
    }

    /// Snapshot every tracked backend
    #[must_use]
    pub fn snapshots(&self) -> HashMap<Backend, BackendSnapshot> {
        self.lock()
            .iter()
            .map(|(backend, stats)| (*backend, make_snapshot(*backend, stats)))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Backend, BackendStats>> {
        self.backends.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn make_snapshot(backend: Backend, stats: &BackendStats) -> BackendSnapshot {
    let avg_latency_ms = if stats.requests > 0 {
        stats.total_latency_ms as f64 / stats.requests as f64
    } else {
        0.0
    };

    BackendSnapshot {
        backend,
        requests: stats.requests,
        input_tokens: stats.input_tokens,
        output_tokens: stats.output_tokens,
        cost_usd: stats.cost_usd,
        avg_latency_ms,
        errors: stats.errors,
        last_request: stats.last_request,
    }
}
