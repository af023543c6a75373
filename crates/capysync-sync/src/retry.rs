//! Retry with exponential backoff
//!
//! Transient errors (network, rate limiting, server errors) are retried with
//! exponential backoff: with the default policy 1s, 2s, 4s, 8s, 16s (max 5
//! retries). A `Retry-After` wait sent by the service replaces the backoff
//! delay for that attempt. Anything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use capysync_core::config::RetryConfig;
use capysync_core::ports::object_store::RemoteError;

/// Maximum number of retries for transient errors
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Base delay for exponential backoff (1 second)
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Determines whether an error is transient (retryable)
///
/// A [`RemoteError`] tag in the chain decides. Untagged errors are matched
/// on their root cause only, never on context, since context carries object
/// keys. Transient errors include:
/// - Network errors (connection refused, timeout, DNS)
/// - Rate limiting (HTTP 429, S3 `SlowDown`)
/// - Server errors (HTTP 5xx)
pub fn is_transient_error(err: &anyhow::Error) -> bool {
    if let Some(remote) = RemoteError::find(err) {
        return remote.is_transient();
    }

    let err_str = err.root_cause().to_string().to_lowercase();

    // Network errors
    if err_str.contains("network")
        || err_str.contains("connection")
        || err_str.contains("timeout")
        || err_str.contains("timed out")
        || err_str.contains("dns")
        || err_str.contains("reset by peer")
        || err_str.contains("broken pipe")
    {
        return true;
    }

    // Rate limiting
    if err_str.contains("429")
        || err_str.contains("too many requests")
        || err_str.contains("rate limit")
        || err_str.contains("slowdown")
    {
        return true;
    }

    // Server errors (5xx)
    if err_str.contains("500")
        || err_str.contains("502")
        || err_str.contains("503")
        || err_str.contains("504")
        || err_str.contains("server error")
    {
        return true;
    }

    false
}

/// Backoff settings applied to every remote call of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt + 1`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Executes an async operation, retrying transient failures
    ///
    /// Non-transient errors are returned immediately. After the last retry
    /// the final error is returned unchanged.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_transient_error(&err) {
                        let delay = RemoteError::find(&err)
                            .and_then(RemoteError::retry_after)
                            .unwrap_or_else(|| self.delay_for(attempt));
                        warn!(
                            operation = operation_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        return Err(err);
                    }
                }
            }
        }
    }
}
