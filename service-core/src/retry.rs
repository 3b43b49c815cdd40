//! Retry utilities for outbound calls to third-party APIs.
//!
//! Provides configurable retry logic with exponential backoff. The caller
//! decides which errors are transient; only idempotent operations should be
//! wrapped.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial backoff duration before first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config for quick retries (smaller backoffs).
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Execute an async operation, retrying failures that `is_retryable` accepts.
///
/// # Example
/// ```ignore
/// let token = retry_with_backoff(
///     &RetryConfig::quick(),
///     "fetch_token",
///     GatewayError::is_retryable,
///     || async { client.fetch_token().await },
/// ).await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    operation_name: &str,
    is_retryable: R,
    f: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "Call failed with non-retryable error"
                    );
                    return Err(err);
                }

                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        error = %err,
                        "Call failed after max retries"
                    );
                    return Err(err);
                }

                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Call failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
