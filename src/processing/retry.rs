//! Fixed-delay retry loop for backend calls.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// How many times an operation is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Policy making `max_attempts` attempts (at least one) separated by `delay`.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy allowing `max_retries` retries after the first attempt.
    pub fn from_retries(max_retries: u32, delay: Duration) -> Self {
        Self::new(max_retries.saturating_add(1), delay)
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Run `operation` until it succeeds or the policy's attempts are exhausted.
///
/// The closure receives the 1-based attempt number. The last error is returned when every
/// attempt fails.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Operation succeeded after retrying"
                    );
                }
                return Ok(value);
            }
            Err(error) if attempt < policy.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Attempt failed; retrying"
                );
                if !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(error) => {
                tracing::warn!(
                    operation = operation_name,
                    attempts = attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %error,
                    "Operation failed after exhausting retries"
                );
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry(
            RetryPolicy::new(3, Duration::ZERO),
            "flaky",
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            RetryPolicy::from_retries(2, Duration::ZERO),
            "broken",
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            },
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn policy_always_allows_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::from_retries(0, Duration::ZERO).max_attempts(), 1);
    }
}
