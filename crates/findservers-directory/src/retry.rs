//! Bounded retry policy for shard queries

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per shard, including the first
    pub max_attempts: u32,

    /// Pause after an attempt that returned no records or was rate limited
    pub empty_backoff: Duration,

    /// Upper bound for a server-provided Retry-After hint
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            empty_backoff: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy without pauses, for tests and one-off tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            empty_backoff: Duration::ZERO,
            max_retry_after: Duration::ZERO,
        }
    }

    /// Run `attempt` until it yields at least one record or the budget runs out.
    ///
    /// The closure receives the 1-based attempt number. Errors are logged and
    /// absorbed; an exhausted budget yields an empty list. The backoff is only
    /// slept between attempts, never after the last one.
    pub async fn run<F, Fut, T>(&self, label: &str, mut attempt: F) -> Vec<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchResult<Vec<T>>>,
    {
        let max_attempts = self.max_attempts.max(1);

        for n in 1..=max_attempts {
            let delay = match attempt(n).await {
                Ok(records) if !records.is_empty() => return records,
                Ok(_) => {
                    tracing::warn!("{label}, attempt {n}/{max_attempts}: no records returned");
                    Some(self.empty_backoff)
                }
                Err(e) if !e.should_retry() => {
                    tracing::warn!("{label}, attempt {n}/{max_attempts}: giving up: {e}");
                    return Vec::new();
                }
                Err(e) => {
                    tracing::warn!("{label}, attempt {n}/{max_attempts}: {e}");
                    match e {
                        FetchError::RateLimited { retry_after } => Some(
                            retry_after
                                .map_or(self.empty_backoff, |hint| hint.min(self.max_retry_after)),
                        ),
                        _ => None,
                    }
                }
            };

            if n < max_attempts {
                if let Some(delay) = delay.filter(|d| !d.is_zero()) {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::warn!("{label}: retry budget exhausted, using empty result");
        Vec::new()
    }
}
