//! Retry and backoff policy shared by the submitter and the poller.
//!
//! One [`RetryPolicy`] describes the delay curve (initial delay, growth
//! factor, cap), an optional attempt limit and which errors are worth
//! retrying. The submitter honours the attempt limit; the poller ignores
//! it and is bounded by its wall-clock budget instead.

use std::time::Duration;

use crate::backend::BackendError;

/// Floor for every delay a policy hands out. A zero interval would turn
/// the poll loop into a spin.
pub const MIN_DELAY: Duration = Duration::from_millis(10);

/// Tunable retry parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the second attempt (and the poll interval).
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each attempt. `1.0` keeps a
    /// fixed cadence.
    pub multiplier: f64,
    /// Total attempts allowed, including the first. `None` is unbounded.
    pub max_attempts: Option<u32>,
    /// Which errors may be retried.
    pub retriable: fn(&BackendError) -> bool,
}

impl Default for RetryPolicy {
    /// Exponential 1s, 2s, 4s ... capped at 30s, transient errors only,
    /// no attempt limit.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
            retriable: BackendError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Constant delay between attempts.
    pub fn fixed(interval: Duration) -> Self {
        let interval = interval.max(MIN_DELAY);
        Self {
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Delay starting at `initial`, multiplied by `multiplier` after each
    /// attempt and clamped to `max`.
    pub fn exponential(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let initial = initial.max(MIN_DELAY);
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            multiplier,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn with_retriable(mut self, retriable: fn(&BackendError) -> bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn is_retriable(&self, err: &BackendError) -> bool {
        (self.retriable)(err)
    }

    /// Whether a failed attempt number `attempt` (1-based) should be
    /// followed by another one.
    pub fn should_retry(&self, err: &BackendError, attempt: u32) -> bool {
        let attempts_left = self.max_attempts.map_or(true, |max| attempt < max);
        attempts_left && self.is_retriable(err)
    }

    /// Delay before the second attempt, never below [`MIN_DELAY`].
    pub fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_DELAY)
    }

    /// Calculate the next delay from the current one.
    ///
    /// The result is clamped to [`RetryPolicy::max_delay`], never shrinks
    /// below the current delay and never drops under [`MIN_DELAY`].
    pub fn next_delay(&self, current: Duration) -> Duration {
        let current = current.max(MIN_DELAY);
        let multiplier = self.multiplier.max(1.0);
        let next_ms = (current.as_millis() as f64 * multiplier) as u64;
        Duration::from_millis(next_ms).max(current).min(self.max_delay.max(current))
    }
}
