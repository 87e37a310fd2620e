use std::time::Duration;

use serde::{Deserialize, Serialize};

use postilion_core::DispatchError;
use postilion_executor::RetryPolicy;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// # Examples
///
/// ```
/// use postilion_dispatch::DispatcherConfig;
///
/// let config = DispatcherConfig::new("bounce@example.com");
/// assert_eq!(config.max_attempts, 3);
/// assert_eq!(config.delay_ms, 1000);
/// assert!(!config.retry_pool_failures);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum delivery attempts per dispatch. Defaults to 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds. Defaults to 1000.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Return-path address applied to every outbound envelope before send.
    pub return_path: String,

    /// Whether pool acquisition failures are retried like transport
    /// faults. Defaults to `false`: a pool fault propagates immediately.
    #[serde(default)]
    pub retry_pool_failures: bool,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::DEFAULT_MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    1000
}

impl DispatcherConfig {
    /// Create a config with the given return path and default retry
    /// settings.
    pub fn new(return_path: impl Into<String>) -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            return_path: return_path.into(),
            retry_pool_failures: false,
        }
    }

    /// Override the attempt bound.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the inter-attempt delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Treat pool acquisition failures as retryable.
    #[must_use]
    pub fn with_retry_pool_failures(mut self, retry: bool) -> Self {
        self.retry_pool_failures = retry;
        self
    }

    /// The inter-attempt delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Validate the retry settings into a policy. Fails fast on a zero
    /// attempt bound.
    pub fn retry_policy(&self) -> Result<RetryPolicy, DispatchError> {
        RetryPolicy::new(self.max_attempts, self.delay())
    }
}
