//! Retry policy for transient delivery failures (exponential backoff)

use pushgate_config::DispatchConfig;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first transient failure
    pub retry_bound: u32,
    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Cap on any single delay (milliseconds)
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a retry policy from the dispatch configuration
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            retry_bound: config.retry_bound,
            initial_delay_ms: config.retry_initial_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            backoff_multiplier: config.retry_backoff_multiplier,
        }
    }

    /// Total number of sink calls a target may receive
    pub fn max_attempts(&self) -> u32 {
        self.retry_bound.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = (self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay_ms as f64)
            .max(0.0) as u64;
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}
