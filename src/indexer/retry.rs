//! Retry With Backoff
//!
//! Doubling, capped backoff with random jitter. Only errors classified as
//! retryable are attempted again; everything else is returned immediately.

use crate::error::{BridgeError, Result};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 150,
            max_backoff_ms: 1200,
            jitter_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately, used where wall-clock time matters (tests).
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter_ms: 0,
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn backoff(&self, retry: usize) -> Duration {
        let factor = 1u64.checked_shl(retry.min(32) as u32).unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }

    pub(crate) fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random::<u64>() % self.jitter_ms)
    }

    /// Runs `op` until it succeeds, fails terminally, or attempts run out.
    /// The closure receives the 0-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.backoff(attempt) + self.jitter();
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(BridgeError::RetryableTransport(format!(
            "{}: retry attempts exhausted",
            label
        )))
    }
}
