//! Retry with exponential backoff
//!
//! Wraps a fallible async operation and retries it with a delay that doubles
//! after each failed attempt, up to a ceiling.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Retry policy for [`with_backoff`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl BackoffPolicy {
    /// Policy that tries exactly once
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after the failed attempt with the given 0-based index
    ///
    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Returned when every attempt failed
#[derive(Debug, Error)]
#[error("{message} (after {attempts} attempt(s))")]
pub struct RetryError<E> {
    /// Total attempts made, including the first
    pub attempts: u32,
    /// Rendered form of the last error
    pub message: String,
    /// The error from the final attempt
    pub last_error: E,
}

/// Runs `operation`, retrying failures with exponential backoff
///
/// Sleeps [`BackoffPolicy::delay_for`] between attempts but not after the
/// final one. Returns the first success, or the last error wrapped in a
/// [`RetryError`].
pub async fn with_backoff<T, E, F, Fut>(policy: &BackoffPolicy, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                debug!(attempt = attempt + 1, ?delay, %error, "Attempt failed, retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(RetryError {
                    attempts: attempt + 1,
                    message: error.to_string(),
                    last_error: error,
                });
            }
        }
    }
}
