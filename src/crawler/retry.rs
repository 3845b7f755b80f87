//! Bounded exponential backoff for transient fetch failures

use crate::config::RetryConfig;
use crate::FetchError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry schedule for a single network fetch
///
/// Attempt `n` (1-based) that fails transiently is followed by a wait of
/// `base * 2^(n-1)`, capped at `max_delay`, until `max_attempts` attempts
/// have been made. Non-transient errors are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Wait before the next attempt, or None when the error is final
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just failed (1-based)
    /// * `error` - Why it failed
    pub fn next_delay(&self, attempt: u32, error: &FetchError) -> Option<Duration> {
        if !error.is_transient() || attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay_for(attempt))
    }

    /// Sleeps for `delay` unless the run is cancelled first
    pub async fn sleep(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
