//! Retry policy for idempotent gateway calls

use std::time::Duration;

use crate::config::ClientConfig;

/// Upper bound for a single backoff pause
const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    /// Pause before the first retry, doubled for each following one
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts for a call, retryable or not
    pub fn attempts(&self, retryable: bool) -> u32 {
        if retryable {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Pause after the `attempt`-th failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exponent).min(MAX_BACKOFF)
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }
}
