use crate::config::WaitConfig;
use crate::error::{ErrorKind, Result};
use crate::query::reader::QueryReader;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOutcome {
    pub expected: u64,
    /// Last count the cluster reported; 0 if no poll succeeded.
    pub observed: u64,
    pub converged: bool,
    pub polls: usize,
    pub elapsed: Duration,
}

pub struct ConsistencyWaiter {
    reader: QueryReader,
}

impl ConsistencyWaiter {
    pub fn new(reader: QueryReader) -> Self {
        Self { reader }
    }

    pub async fn wait_with(&self, expected: u64, expression: &str, config: &WaitConfig) -> Result<WaitOutcome> {
        self.wait_until_visible(expected, expression, config.timeout(), config.poll_interval())
            .await
    }

    /// Polls the count of `expression` until it equals `expected` or `timeout` passes.
    ///
    /// `timeout` bounds the whole call, including a count request that hangs.
    /// Running out of time is reported through `converged == false`, not as an
    /// error; only a query the cluster cannot execute fails the call.
    pub async fn wait_until_visible(
        &self,
        expected: u64,
        expression: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<WaitOutcome> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut observed = 0;
        let mut polls = 0;

        loop {
            polls += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.reader.count(expression)).await {
                Ok(Ok(count)) => {
                    observed = count;
                    if count == expected {
                        tracing::debug!(
                            "{} documents visible in {} after {} polls",
                            count,
                            self.reader.collection(),
                            polls
                        );
                        return Ok(WaitOutcome {
                            expected,
                            observed,
                            converged: true,
                            polls,
                            elapsed: started.elapsed(),
                        });
                    }
                }
                Ok(Err(e)) if matches!(e.kind(), ErrorKind::QueryExecution | ErrorKind::Configuration) => {
                    return Err(e);
                }
                Ok(Err(e)) => tracing::warn!("Visibility poll {} failed: {}", polls, e),
                Err(_) => tracing::debug!("Visibility poll {} ran out of time", polls),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(poll_interval.min(remaining)).await;
        }

        tracing::warn!(
            "Timed out after {:?} waiting for {} documents in {}; last count {}",
            timeout,
            expected,
            self.reader.collection(),
            observed
        );
        Ok(WaitOutcome {
            expected,
            observed,
            converged: false,
            polls,
            elapsed: started.elapsed(),
        })
    }
}
