use std::future::Future;

use tracing::info;

use postilion_core::DispatchError;

use crate::policy::RetryPolicy;

/// Runs a single fallible asynchronous operation under a bounded-retry
/// policy with a constant inter-attempt delay.
///
/// Only failures classified as retryable by
/// [`DispatchError::is_retryable`] are retried; any other failure
/// propagates on first occurrence. The final attempt's failure is returned
/// unchanged, with no delay and no log entry after it.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor from the given policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use postilion_executor::{RetryExecutor, RetryPolicy};
    ///
    /// let executor = RetryExecutor::new(RetryPolicy::default());
    /// assert_eq!(executor.policy().max_attempts(), 3);
    /// ```
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy governing this executor.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `operation` up to the policy's attempt bound.
    ///
    /// Each pre-final retryable failure produces exactly one info-level
    /// log entry carrying the 1-based attempt number, then a cooperative
    /// sleep for the policy delay before the next attempt.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        for attempt in 1..=self.policy.max_attempts() {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || self.policy.is_final(attempt) {
                        return Err(err);
                    }
                    info!(
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay()).await;
                }
            }
        }

        // Reachable only with a zero attempt bound, which the policy
        // constructor rejects.
        Err(DispatchError::Configuration(
            "retry policy allows zero attempts".to_owned(),
        ))
    }
}
