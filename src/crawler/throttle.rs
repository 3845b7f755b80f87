//! Per-source request spacing

use crate::FetchError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Enforces a minimum interval between consecutive requests to one source
///
/// Each adapter worker owns its own throttle, so sources are limited
/// independently of each other.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_request_time: Option<Instant>,
    request_count: u32,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request_time: None,
            request_count: 0,
        }
    }

    /// Time left before the next request may go out, None if it may go now
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= self.min_interval {
            None
        } else {
            Some(self.min_interval - elapsed)
        }
    }

    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Number of requests let through so far
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Waits until a request is allowed, then records it
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        if let Some(wait) = self.time_until_next_request(Instant::now()) {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.record_request(Instant::now());
        Ok(())
    }
}
