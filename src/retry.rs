// src/retry.rs

//! Bounded retry with exponential backoff.
//!
//! Between attempt `i` and `i + 1` (0-indexed) the policy sleeps for
//! `min(base_delay * backoff_factor^i, max_delay)`. When the last attempt
//! fails, the error from that attempt is returned as-is. Errors whose
//! [`ErrorKind`] is not in `retry_on` are returned immediately.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::errors::{Classify, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub retry_on: HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            retry_on: HashSet::from([ErrorKind::Transient]),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep between attempt `attempt` and `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    pub fn is_retryable<E: Classify>(&self, err: &E) -> bool {
        self.retry_on.contains(&err.kind())
    }

    /// Run `op` under this policy. `what` only labels log lines.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !self.is_retryable(&err) => {
                    warn!(op = %what, error = %err, kind = ?err.kind(), "non-retryable failure");
                    return Err(err);
                }
                Err(err) if attempt + 1 >= attempts => {
                    error!(op = %what, attempts, error = %err, "all attempts failed");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = %what,
                        attempt = attempt + 1,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
