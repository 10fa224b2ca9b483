//! Retry with exponential backoff for registry requests

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// At most `max_attempts` tries; the wait before retry `n` is
/// `initial_delay * 2^(n-1)`. Only errors reporting
/// [`is_retryable`](crate::error::PullerError::is_retryable) are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run
    /// out. The closure receives the 1-based attempt number. The error from
    /// the last attempt is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "{} failed, retrying: {}",
                        operation_name,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PullerError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_success_on_nth_attempt_uses_exactly_n_attempts() {
        for succeed_on in 1..=3u32 {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = calls.clone();

            let result = fast_policy()
                .execute("test op", |attempt| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < succeed_on {
                            Err(PullerError::Network(format!("attempt {}", attempt)))
                        } else {
                            Ok(attempt)
                        }
                    }
                })
                .await;

            assert_eq!(result.unwrap(), succeed_on);
            assert_eq!(calls.load(Ordering::SeqCst), succeed_on);
        }
    }

    #[tokio::test]
    async fn test_persistent_failure_returns_last_error_after_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast_policy()
            .execute("test op", |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(PullerError::Network(format!("attempt {}", attempt))) }
            })
            .await;

        match result {
            Err(PullerError::Network(msg)) => assert_eq!(msg, "attempt 3"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast_policy()
            .execute("test op", |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(PullerError::Registry {
                        status: 404,
                        message: "not found".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(PullerError::Registry { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_waits_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = std::time::Instant::now();

        let _: Result<()> = policy
            .execute("test op", |_| async { Err(PullerError::Timeout("slow".into())) })
            .await;

        // 20ms + 40ms
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
