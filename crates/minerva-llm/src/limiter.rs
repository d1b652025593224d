//! Per-backend rate limiting
//!
//! Sliding 60-second window over request count and token volume. One
//! instance exists per configured backend for the process lifetime, shared
//! by every concurrent `complete()` call, so all state lives behind a
//! mutex and each check or update is atomic.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admission window length
pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct WindowState {
    /// Timestamps of recorded requests, oldest first
    requests: VecDeque<Instant>,
    /// (timestamp, token count) of recorded requests, oldest first
    tokens: VecDeque<(Instant, u32)>,
}

impl WindowState {
    /// Drop entries that have aged out of the window. First step of every
    /// read or write so no expired entry survives any operation.
    fn prune(&mut self, now: Instant) {
        while self
            .requests
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= WINDOW)
        {
            self.requests.pop_front();
        }
        while self
            .tokens
            .front()
            .is_some_and(|(ts, _)| now.duration_since(*ts) >= WINDOW)
        {
            self.tokens.pop_front();
        }
    }

    fn tokens_used(&self) -> u64 {
        self.tokens.iter().map(|(_, t)| u64::from(*t)).sum()
    }

    /// Oldest tracked timestamp across both lists
    fn oldest(&self) -> Option<Instant> {
        match (self.requests.front(), self.tokens.front().map(|(ts, _)| ts)) {
            (Some(a), Some(b)) => Some(*a.min(b)),
            (Some(a), None) => Some(*a),
            (None, Some(b)) => Some(*b),
            (None, None) => None,
        }
    }
}

/// Sliding-window rate limiter for a single backend.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    tokens_per_minute: u32,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a limiter with the given per-minute caps
    #[must_use]
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Whether a request with the given token estimate would be admitted.
    ///
    /// Denies when the window already holds `requests_per_minute` requests,
    /// or when recorded token usage plus the estimate would exceed
    /// `tokens_per_minute`.
    #[must_use]
    pub fn can_request(&self, estimated_tokens: u32) -> bool {
        self.can_request_at(Instant::now(), estimated_tokens)
    }

    fn can_request_at(&self, now: Instant, estimated_tokens: u32) -> bool {
        let mut state = self.lock();
        state.prune(now);

        if state.requests.len() >= self.requests_per_minute as usize {
            return false;
        }
        state.tokens_used() + u64::from(estimated_tokens) <= u64::from(self.tokens_per_minute)
    }

    /// Record a completed request. Called only after a successful call.
    pub fn record_request(&self, tokens_used: u32) {
        self.record_request_at(Instant::now(), tokens_used);
    }

    fn record_request_at(&self, now: Instant, tokens_used: u32) {
        let mut state = self.lock();
        state.prune(now);
        state.requests.push_back(now);
        state.tokens.push_back((now, tokens_used));
    }

    /// Advisory wait until the window would admit another request.
    ///
    /// Zero when admission would currently succeed, otherwise the time
    /// until the oldest tracked entry exits the window (at most 60s).
    #[must_use]
    pub fn wait_time(&self) -> Duration {
        self.wait_time_at(Instant::now())
    }

    fn wait_time_at(&self, now: Instant) -> Duration {
        let mut state = self.lock();
        state.prune(now);

        let at_request_cap = state.requests.len() >= self.requests_per_minute as usize;
        let at_token_cap = state.tokens_used() >= u64::from(self.tokens_per_minute);
        if !at_request_cap && !at_token_cap {
            return Duration::ZERO;
        }

        match state.oldest() {
            Some(oldest) => WINDOW.saturating_sub(now.duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_under_both_caps() {
        let limiter = RateLimiter::new(10, 1_000);
        assert!(limiter.can_request(500));
    }

    #[test]
    fn test_denies_at_request_cap_regardless_of_tokens() {
        let limiter = RateLimiter::new(3, 1_000_000);
        let now = Instant::now();
        for _ in 0..3 {
            limiter.record_request_at(now, 1);
        }

        assert!(!limiter.can_request_at(now, 0));
        assert!(!limiter.can_request_at(now, 1));
    }

    #[test]
    fn test_admission_returns_after_oldest_entry_expires() {
        let limiter = RateLimiter::new(2, 1_000_000);
        let start = Instant::now();
        limiter.record_request_at(start, 10);
        limiter.record_request_at(start + Duration::from_secs(30), 10);

        let later = start + Duration::from_secs(59);
        assert!(!limiter.can_request_at(later, 10));

        // Oldest entry ages out at start + 60s
        let after = start + Duration::from_secs(60);
        assert!(limiter.can_request_at(after, 10));
    }

    #[test]
    fn test_denies_when_token_budget_would_be_exceeded() {
        let limiter = RateLimiter::new(100, 1_000);
        let now = Instant::now();
        limiter.record_request_at(now, 900);

        // Request count is well under the cap, tokens are not
        assert!(!limiter.can_request_at(now, 200));
        assert!(limiter.can_request_at(now, 100));
    }

    #[test]
    fn test_wait_time_zero_when_admitting() {
        let limiter = RateLimiter::new(10, 1_000);
        assert_eq!(limiter.wait_time(), Duration::ZERO);
    }

    #[test]
    fn test_wait_time_until_oldest_expires() {
        let limiter = RateLimiter::new(1, 1_000_000);
        let start = Instant::now();
        limiter.record_request_at(start, 10);

        let wait = limiter.wait_time_at(start + Duration::from_secs(20));
        assert_eq!(wait, Duration::from_secs(40));

        // Never exceeds the window
        let wait = limiter.wait_time_at(start);
        assert!(wait <= WINDOW);
    }

    #[test]
    fn test_expired_entries_are_pruned_on_read() {
        let limiter = RateLimiter::new(1, 100);
        let start = Instant::now();
        limiter.record_request_at(start, 100);

        let after = start + Duration::from_secs(61);
        assert!(limiter.can_request_at(after, 100));
        assert_eq!(limiter.wait_time_at(after), Duration::ZERO);

        let state = limiter.lock();
        assert!(state.requests.is_empty());
        assert!(state.tokens.is_empty());
    }
}
