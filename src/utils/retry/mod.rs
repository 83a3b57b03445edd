//! Retry policy with exponential backoff, cap, and jitter.
//!
//! One policy value drives every retry in the crate. Store calls that fail
//! transiently go through [`retry_transient`]; the loader's resubmission of
//! unprocessed batch items walks the same schedule via [`RetryPolicy::delays`].

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use tracing::warn;

use crate::storage::StoreError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry (before jitter). Doubles per attempt.
    pub base_delay: Duration,
    /// Maximum delay cap (before jitter).
    pub max_delay: Duration,
    /// Maximum number of retry attempts (0 = no retries, just initial attempt).
    pub max_retries: u32,
    /// Add random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            max_retries: 5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_retries,
            jitter: false,
        }
    }

    /// Backoff builder for this policy.
    pub fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// The delays to wait before each retry, in order. Yields exactly
    /// `max_retries` values.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        self.backoff().build()
    }
}

/// Run `call`, retrying transient store errors according to `policy`.
///
/// Non-transient errors (configuration, malformed data) are returned
/// immediately. Once retries are exhausted the last transient error is
/// returned.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    call.retry(policy.backoff())
        .when(StoreError::is_transient)
        .notify(|err: &StoreError, delay: Duration| {
            warn!(operation = %operation, error = %err, delay = ?delay, "Store call failed, retrying");
        })
        .await
}
