//! Retry utilities with capped exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (0 means no call at all
    /// is retried; 1 means a single attempt)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Ceiling applied to every computed delay
    pub max_delay: Duration,

    /// Backoff multiplier (e.g. 2.0 for doubling)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the maximum delay between retries.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay slept after the given failed attempt (1-based):
    /// `initial · multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let millis = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Retry an async operation, consulting a predicate to decide whether an
/// error is worth retrying. The final error is returned unchanged.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = config.max_attempts.max(1);

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error) || attempt == attempts {
                    return Err(error);
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after transient error"
                );
                sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = RetryConfig::new(5, Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_capped_at_max_delay() {
        let config =
            RetryConfig::new(10, Duration::from_millis(100)).with_max_delay(Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(9), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_predicate(
            &config,
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(42)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_predicate(
            &config,
            || {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"))
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_final_error() {
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_predicate(
            &config,
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"))
                }
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retriable_fails_immediately() {
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = retry_with_predicate(
            &config,
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "auth",
                    ))
                }
            },
            |err| err.kind() == std::io::ErrorKind::TimedOut,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
