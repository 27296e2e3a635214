//! Retry logic for calls into external capabilities.
//!
//! Implements exponential backoff with jitter. Only errors that report
//! themselves as retryable are attempted again.

use std::future::Future;
use std::time::Duration;
use rand::Rng;

use crate::error::CalendarError;

/// Errors that know whether repeating the call may help.
pub trait Retryable {
    /// Whether the failed operation may succeed when repeated.
    fn is_retryable(&self) -> bool;
}

impl Retryable for CalendarError {
    fn is_retryable(&self) -> bool {
        CalendarError::is_retryable(self)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Calculate the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..1.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed after all retries, or with a non-retryable error.
    Failed {
        last_error: E,
        attempts: u32,
    },
}

impl<T, E> RetryResult<T, E> {
    /// Collapse into a plain `Result`, dropping the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }
}

/// Execute an operation with retry logic.
///
/// `attempts` in the failure counts every call made, including the first.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return RetryResult::Success(result),
            Err(e) => {
                if !e.is_retryable() || attempts > policy.max_retries {
                    return RetryResult::Failed {
                        last_error: e,
                        attempts,
                    };
                }

                let delay = policy.delay_for_attempt(attempts - 1);
                tracing::debug!(
                    "Retry attempt {} after {:?}: {:?}",
                    attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
