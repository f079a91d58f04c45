//! Retry helper for transient network failures.
//!
//! Backoff delays come from [`RetryConfig`]; strategies are linear and
//! exponential, both capped at a configured maximum.

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{BackoffStrategy, RetryConfig};

/// Retry helper with configurable backoff
pub struct RetryHelper {
    config: RetryConfig,
}

impl RetryHelper {
    /// Create a new retry helper from config
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Execute an async operation with retries and backoff.
    ///
    /// The `retryable` predicate decides whether a given error is worth
    /// another attempt; terminal errors are returned immediately.
    pub async fn with_retry<T, E, F, Fut, P>(&self, operation: F, retryable: P) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Debug,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !retryable(&e) {
                        debug!("Non-retryable error on attempt {}: {:?}", attempt, e);
                        return Err(e);
                    }

                    if attempt > self.config.max_retries {
                        warn!(
                            "All {} retry attempts exhausted, giving up",
                            self.config.max_retries
                        );
                        return Err(e);
                    }

                    let delay = self.config.backoff_delay(attempt);
                    debug!(
                        "Attempt {} failed ({:?}), retrying in {:?} with {:?} backoff",
                        attempt, e, delay, self.config.backoff_strategy
                    );

                    sleep(delay).await;
                }
            }
        }
    }

    /// Get the maximum number of retries
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Get the backoff strategy
    pub fn backoff_strategy(&self) -> &BackoffStrategy {
        &self.config.backoff_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            backoff_strategy: BackoffStrategy::Linear,
            backoff_base_delay_ms: 1,
            backoff_max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let helper = RetryHelper::new(&fast_config());
        let result: Result<u32, &str> = helper.with_retry(|| async { Ok(42) }, |_| true).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let helper = RetryHelper::new(&fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = helper
            .with_retry(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("transient")
                        } else {
                            Ok(7)
                        }
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let helper = RetryHelper::new(&fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = helper
            .with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("always") }
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        // initial attempt plus max_retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let helper = RetryHelper::new(&fast_config());
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = helper
            .with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("terminal") }
                },
                |_| false,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
