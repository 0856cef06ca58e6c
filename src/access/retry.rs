use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::AccessConfig;

/// Fixed-delay retry.
///
/// Every error counts as transient; there is no backoff and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `retries` is the total number of attempts; zero is treated as one.
    #[must_use]
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries: if retries == 0 { 1 } else { retries },
            delay,
        }
    }

    /// A single attempt, no retry.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Invoke `op` until it succeeds or the attempts run out.
    /// Returns the last error once every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries => {
                    warn!(
                        attempt,
                        max_attempts = self.retries,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "All retries failed");
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl From<&AccessConfig> for RetryPolicy {
    fn from(config: &AccessConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("failure {n}"))
                } else {
                    Ok("rows")
                }
            })
            .await;

        assert_eq!(result, Ok("rows"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let result: Result<(), String> = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {n}"))
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_does_not_sleep_or_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(3600));

        let result: Result<u32, String> = policy
            .run(|| async { Ok(calls.fetch_add(1, Ordering::SeqCst)) })
            .await;

        assert_eq!(result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).retries(), 1);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&AccessConfig::default());
        assert_eq!(policy.retries(), 3);
        assert_eq!(policy.delay(), Duration::from_secs(2));
    }
}
