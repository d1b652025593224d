//! Daily spend budget
//!
//! Single cumulative cost counter shared by all backends, reset when the
//! local date rolls over. The check is pre-flight only; cost is added
//! after each successful call, so one expensive call can overshoot the
//! cap and is caught on the next call.

use chrono::NaiveDate;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct BudgetState {
    spent_usd: f64,
    reset_date: NaiveDate,
}

/// Tracks cumulative daily spend against a configured cap.
#[derive(Debug)]
pub struct BudgetTracker {
    daily_budget_usd: f64,
    state: Mutex<BudgetState>,
}

impl BudgetTracker {
    /// Create a tracker with the given daily cap in USD
    #[must_use]
    pub fn new(daily_budget_usd: f64) -> Self {
        Self::new_on(daily_budget_usd, chrono::Local::now().date_naive())
    }

    fn new_on(daily_budget_usd: f64, reset_date: NaiveDate) -> Self {
        Self {
            daily_budget_usd,
            state: Mutex::new(BudgetState {
                spent_usd: 0.0,
                reset_date,
            }),
        }
    }

    /// Pre-flight budget check.
    ///
    /// Rolls the counter to zero exactly once when the current date
    /// differs from the stored reset date, then reports whether spend is
    /// strictly below the cap.
    #[must_use]
    pub fn check(&self) -> bool {
        self.check_on(chrono::Local::now().date_naive())
    }

    fn check_on(&self, today: NaiveDate) -> bool {
        let mut state = self.lock();
        if today != state.reset_date {
            debug!(
                spent_usd = state.spent_usd,
                %today,
                "resetting daily budget counter"
            );
            state.spent_usd = 0.0;
            state.reset_date = today;
        }
        state.spent_usd < self.daily_budget_usd
    }

    /// Add the cost of a completed call to the daily total
    pub fn record_cost(&self, cost_usd: f64) {
        let mut state = self.lock();
        state.spent_usd += cost_usd;
    }

    /// Cumulative spend for the current day
    #[must_use]
    pub fn spent_today(&self) -> f64 {
        self.lock().spent_usd
    }

    /// Configured daily cap
    #[must_use]
    pub fn daily_budget_usd(&self) -> f64 {
        self.daily_budget_usd
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, n).unwrap()
    }

    #[test]
    fn test_admits_below_cap_and_blocks_at_cap() {
        let tracker = BudgetTracker::new(1.0);
        assert!(tracker.check());

        tracker.record_cost(0.5);
        assert!(tracker.check());

        tracker.record_cost(0.5);
        assert!(!tracker.check());
    }

    #[test]
    fn test_repeated_checks_same_day_do_not_reset() {
        let tracker = BudgetTracker::new_on(1.0, day(10));
        tracker.record_cost(0.75);

        assert!(tracker.check_on(day(10)));
        assert!(tracker.check_on(day(10)));
        assert!((tracker.spent_today() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_resets_once_on_date_rollover() {
        let tracker = BudgetTracker::new_on(1.0, day(10));
        tracker.record_cost(2.0);
        assert!(!tracker.check_on(day(10)));

        // Next day: counter zeroed, spending admitted again
        assert!(tracker.check_on(day(11)));
        assert_eq!(tracker.spent_today(), 0.0);
    }

    #[test]
    fn test_overshoot_detected_on_next_check() {
        // Post-hoc accounting: a single expensive call pushes past the cap
        let tracker = BudgetTracker::new(0.0001);
        assert!(tracker.check());

        tracker.record_cost(0.05);
        assert!(!tracker.check());
    }
}
