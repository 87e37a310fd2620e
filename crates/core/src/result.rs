use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Statistics key for the elapsed send time in milliseconds.
pub const STAT_SENDING_TIME: &str = "SendingTime";

/// Statistics key for the serialized envelope size in bytes.
pub const STAT_SIZE: &str = "Size";

/// Outcome of a successful dispatch.
///
/// Carries a key-value statistics map; the dispatcher records the elapsed
/// send time and the serialized envelope size, both formatted as plain
/// integer strings.
///
/// # Examples
///
/// ```
/// use postilion_core::{DispatchResult, STAT_SIZE};
///
/// let mut result = DispatchResult::new();
/// result.record(STAT_SIZE, "2048");
/// assert_eq!(result.statistic(STAT_SIZE), Some("2048"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchResult {
    statistics: HashMap<String, String>,
}

impl DispatchResult {
    /// Create an empty dispatch result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a statistic. Writing an existing key replaces its value.
    pub fn record(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.statistics.insert(key.into(), value.into());
    }

    /// Look up a single statistic by key.
    pub fn statistic(&self, key: &str) -> Option<&str> {
        self.statistics.get(key).map(String::as_str)
    }

    /// The full statistics map.
    pub fn statistics(&self) -> &HashMap<String, String> {
        &self.statistics
    }
}
