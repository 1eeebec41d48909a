//! Exponential backoff for retryable monitoring failures
//!
//! Only errors for which [`Error::is_retryable`] holds are retried; every
//! other error is returned on the first attempt.

use crate::{Error, Result};

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Backoff schedule for the monitoring query call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Sleep before the second attempt
    pub initial_backoff: Duration,
    /// Growth factor between consecutive sleeps
    pub multiplier: u32,
    /// Upper bound on a single sleep
    pub max_backoff: Duration,
    /// Total time budget across all attempts
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            multiplier: 2,
            max_backoff: Duration::from_secs(60),
            deadline: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Sleep before attempt `attempt + 1` (attempts are counted from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// deadline would be exceeded by the next sleep.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    let sleep = self.backoff(attempt);
                    if started.elapsed() + sleep > self.deadline {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "Retry deadline exceeded"
                        );
                        return Err(Error::TooManyRetries {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    metrics::counter!("mqexport_query_retries_total", "operation" => operation.to_string())
                        .increment(1);
                    debug!(
                        "{} failed on attempt {} ({}), retrying after {}ms",
                        operation,
                        attempt,
                        e,
                        sleep.as_millis()
                    );
                    tokio::time::sleep(sleep).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            multiplier: 2,
            max_backoff: Duration::from_millis(4),
            deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast_policy()
            .run("query", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(Error::api(ApiStatus::ServiceUnavailable, "try later"))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = fast_policy()
            .run("query", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::api(ApiStatus::InvalidArgument, "bad query"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.api_status(), Some(ApiStatus::InvalidArgument));
    }

    #[tokio::test]
    async fn test_deadline_exhaustion() {
        let policy = RetryPolicy {
            deadline: Duration::from_millis(10),
            max_backoff: Duration::from_millis(8),
            ..fast_policy()
        };
        let err = policy
            .run("query", || async {
                Err::<(), _>(Error::api(ApiStatus::TooManyRequests, "slow down"))
            })
            .await
            .unwrap_err();
        match err {
            Error::TooManyRetries { attempts, last } => {
                assert!(attempts >= 2);
                assert_eq!(last.api_status(), Some(ApiStatus::TooManyRequests));
            }
            other => panic!("expected TooManyRetries, got {other}"),
        }
    }
}
