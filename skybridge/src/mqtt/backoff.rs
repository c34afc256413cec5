//! Reconnect backoff policy.
//!
//! Exponential backoff for broker connection attempts: the delay starts at
//! [`DEFAULT_INITIAL_DELAY_SECS`], doubles per consecutive failure, is
//! capped at [`DEFAULT_MAX_DELAY_SECS`], and resets to the initial delay on
//! any successful connection. The failure count persists across `connect()`
//! invocations so that the heartbeat-driven retry path keeps climbing the
//! curve instead of hammering a dead broker.

use std::time::Duration;

/// Default initial backoff delay (1 second).
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 1;

/// Default maximum backoff delay (5 minutes).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 300;

/// Default bound on attempts per `connect()` invocation.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Multiplier applied to the delay after each failed attempt.
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Exponential backoff parameters for connection attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Maximum attempts per `connect()` invocation (including the first).
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            max_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given consecutive-failure count (1-based).
    ///
    /// The sequence is non-decreasing and capped at `max_delay`.
    pub fn delay_for_failure(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.initial_delay;
        }
        let factor = BACKOFF_MULTIPLIER.powi(failures.saturating_sub(1).min(63) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Mutable backoff state: the consecutive-failure counter.
#[derive(Debug)]
pub struct BackoffState {
    policy: BackoffPolicy,
    failures: u32,
}

impl BackoffState {
    /// Create fresh state for the given policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failed attempt and return the delay before the next one.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for_failure(self.failures)
    }

    /// Reset to the initial delay after a successful connection.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
