use std::time::Duration;

use postilion_core::DispatchError;

/// Bounded-retry policy: a maximum attempt count and a constant delay
/// applied between attempts.
///
/// Attempts are numbered `1..=max_attempts`; the delay is applied only
/// between attempts, never after the final one. A policy with zero
/// attempts cannot be constructed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use postilion_executor::RetryPolicy;
///
/// let policy = RetryPolicy::new(5, Duration::from_millis(250)).unwrap();
/// assert_eq!(policy.max_attempts(), 5);
///
/// assert!(RetryPolicy::new(0, Duration::ZERO).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Default inter-attempt delay.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

    /// Create a policy, rejecting a zero attempt bound.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, DispatchError> {
        if max_attempts == 0 {
            return Err(DispatchError::Configuration(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay applied between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the given 1-based attempt number is the last one.
    pub fn is_final(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}
