//! # Fibonacci Backoff
//!
//! Progressive backoff for chargers whose cluster actions keep failing.
//! Grows more slowly than exponential backoff, so a charger that fails a few
//! times is retried again soon, while a persistently broken one stops costing
//! an API call every cycle.
//!
//! Sequence with the defaults (30s min, 300s max): 30s, 30s, 60s, 90s, 150s,
//! 240s, 300s (max).
//!
//! Backoff is tied to the declared status that failed. A status change starts
//! over with no backoff.

use charger_store::DeclaredStatus;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting from `min` twice and
/// capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);
        result
    }
}

/// Backoff state for a charger
#[derive(Debug, Clone)]
struct BackoffState {
    status: DeclaredStatus,
    backoff: FibonacciBackoff,
    error_count: u32,
    retry_at: Instant,
}

impl BackoffState {
    fn new(status: DeclaredStatus, min: Duration, max: Duration, now: Instant) -> Self {
        Self {
            status,
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
            retry_at: now,
        }
    }
}

/// Per-charger failure tracking (charger id -> backoff state)
#[derive(Debug)]
pub struct BackoffTracker {
    min: Duration,
    max: Duration,
    states: Mutex<HashMap<i64, BackoffState>>,
}

impl BackoffTracker {
    /// Create a tracker with the given backoff bounds
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Time left before a charger may be retried, if it is backing off.
    ///
    /// `now` is the start of the current cycle, so a backoff equal to the
    /// reconcile interval never skips the next cycle. Failures recorded under
    /// another status do not count.
    pub fn remaining(&self, charger_id: i64, status: DeclaredStatus, now: Instant) -> Option<Duration> {
        match self.states.lock() {
            Ok(states) => states
                .get(&charger_id)
                .filter(|state| state.status == status && state.retry_at > now)
                .map(|state| state.retry_at - now),
            Err(e) => {
                warn!("Failed to lock backoff states: {}, not backing off", e);
                None
            }
        }
    }

    /// Record a failed action and return (backoff, error_count)
    pub fn record_failure(&self, charger_id: i64, status: DeclaredStatus, now: Instant) -> (Duration, u32) {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(charger_id)
                    .or_insert_with(|| BackoffState::new(status, self.min, self.max, now));
                if state.status != status {
                    *state = BackoffState::new(status, self.min, self.max, now);
                }
                state.error_count += 1;
                let backoff = state.backoff.next_backoff();
                state.retry_at = now + backoff;
                (backoff, state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using minimum backoff", e);
                (self.min, 0)
            }
        }
    }

    /// Clear the failure history of a charger (on a successful reconciliation)
    pub fn record_success(&self, charger_id: i64) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(&charger_id);
        }
    }

    /// Forget chargers that are no longer listed by the store
    pub fn retain(&self, charger_ids: &HashSet<i64>) {
        if let Ok(mut states) = self.states.lock() {
            states.retain(|id, _| charger_ids.contains(id));
        }
    }

    /// Number of chargers currently tracked
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }
}
