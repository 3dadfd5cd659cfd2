//! Retry wrapper for storage operations
//!
//! Re-runs an async operation after a short pause when it fails with a
//! retryable error, up to a bounded number of attempts. Which errors are
//! retryable is an explicit policy: [`retry`] retries transient errors only
//! (lock contention, pool timeouts, I/O), [`retry_with`] takes any predicate,
//! and [`retry_all`] retries every error.
//!
//! The wrapped operation may run more than once with the same inputs, so it
//! must be idempotent or convergent (a transaction that rolls back on failure,
//! an upsert, a read).

use std::future::Future;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles before every retry, capped at `max_delay`
    Exponential { max_delay: Duration },
}

/// Bounded retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Base pause between attempts
    pub retry_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential { max_delay } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.retry_delay.saturating_mul(factor).min(max_delay)
            }
        }
    }
}

/// Retry `operation` on transient errors (see [`Error::is_transient`])
pub async fn retry<F, Fut, T>(operation_name: &str, policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with(operation_name, policy, Error::is_transient, operation).await
}

/// Retry `operation` on any error
pub async fn retry_all<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with(operation_name, policy, |_| true, operation).await
}

/// Retry `operation` while `should_retry` accepts the error.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If the error is rejected by `should_retry`, return it immediately
/// 4. If retries remain, log WARN, sleep for the policy delay, go to 1
/// 5. Otherwise log ERROR and return the last error unchanged
pub async fn retry_with<F, Fut, T, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !should_retry(&err) {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Non-retryable error after retry"
                        );
                    }
                    return Err(err);
                }

                if attempt > policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Operation failed: retries exhausted"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_retries.saturating_add(1),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable error, will retry after delay"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> Error {
        Error::Database(sqlx::Error::PoolTimedOut)
    }

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let mut attempts = 0;

        let result = retry("test_op", &quick(3), || {
            attempts += 1;
            async { Ok::<i32, Error>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_always_failing_runs_max_retries_plus_one() {
        for k in [0u32, 1, 3, 5] {
            let mut attempts = 0u32;

            let result = retry("test_op", &quick(k), || {
                attempts += 1;
                async { Err::<i32, Error>(transient()) }
            })
            .await;

            assert!(matches!(result, Err(Error::Database(sqlx::Error::PoolTimedOut))));
            assert_eq!(attempts, k + 1, "max_retries = {}", k);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let mut attempts = 0;

        let result = retry("test_op", &quick(3), || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_max_retry_budget_logs_without_overflow() {
        // Attempt fields are only evaluated when a subscriber listens at WARN
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut attempts = 0;
        let result = retry("test_op", &quick(u32::MAX), || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_immediately() {
        let mut attempts = 0;

        let result = retry("test_op", &quick(3), || {
            attempts += 1;
            async { Err::<i32, Error>(Error::InvalidInput("bad score".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_all_retries_permanent_errors() {
        let mut attempts = 0;

        let result = retry_all("test_op", &quick(2), || {
            attempts += 1;
            async { Err::<i32, Error>(Error::InvalidInput("bad score".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let mut attempts = 0;

        let result = retry_with(
            "test_op",
            &quick(4),
            |err| matches!(err, Error::NotFound(_)),
            || {
                attempts += 1;
                let current = attempts;
                async move {
                    if current == 1 {
                        Err(Error::NotFound("row".to_string()))
                    } else {
                        Err::<i32, Error>(Error::Internal("boom".to_string()))
                    }
                }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Internal(_))));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_fixed_delay_is_observed() {
        let policy = RetryPolicy::new(2, Duration::from_millis(20));
        let start = Instant::now();

        let _ = retry("test_op", &policy, || async { Err::<(), Error>(transient()) }).await;

        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_exponential_delay_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(10)).with_backoff(Backoff::Exponential {
            max_delay: Duration::from_millis(50),
        });

        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(4), Duration::from_millis(50));
        assert_eq!(policy.delay_for(30), Duration::from_millis(50));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), DEFAULT_RETRY_DELAY);
        assert_eq!(policy.delay_for(3), DEFAULT_RETRY_DELAY);
    }
}
