//! Failure policy attached to task nodes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recovery policy applied when a work item handler faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlingStrategy {
    /// Complete the work item with whatever partial results exist and continue.
    Complete,
    /// Abort the work item and follow only the node's abort connections.
    Abort,
    /// Move the instance to ERROR and leave the work item for operator recovery.
    Rethrow,
    /// Re-execute the same work item, bounded by a [`RetryConfig`].
    Retry,
}

impl std::fmt::Display for HandlingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "COMPLETE"),
            Self::Abort => write!(f, "ABORT"),
            Self::Rethrow => write!(f, "RETHROW"),
            Self::Retry => write!(f, "RETRY"),
        }
    }
}

/// Retry policy with configurable backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of executions (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default)]
    pub initial_delay_ms: u64,
    /// Upper bound on delay, in milliseconds.
    #[serde(default)]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::immediate(3)
    }
}

impl RetryConfig {
    /// Retry without any delay between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, 0)
    }

    /// Create a fixed-delay retry policy.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Create an exponential-backoff retry policy (multiplier = 2.0).
    #[must_use]
    pub fn exponential(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Total executions allowed, never less than one.
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculate the delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0) as u64;
        Duration::from_millis(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_is_three_immediate_attempts() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.attempt_budget(), 3);
        assert_eq!(cfg.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(cfg.delay_for_attempt(5), Duration::ZERO);
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(3, 500)]
    #[case(10, 500)]
    fn exponential_backoff_is_capped(#[case] attempt: u32, #[case] expected_ms: u64) {
        let cfg = RetryConfig::exponential(10, 100, 500);
        assert_eq!(cfg.delay_for_attempt(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn zero_attempts_still_executes_once() {
        assert_eq!(RetryConfig::immediate(0).attempt_budget(), 1);
    }

    #[test]
    fn missing_backoff_fields_default_on_deserialize() {
        let cfg: RetryConfig = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(cfg, RetryConfig::immediate(2));
    }

    #[test]
    fn strategy_serializes_in_upper_case() {
        let json = serde_json::to_string(&HandlingStrategy::Rethrow).unwrap();
        assert_eq!(json, "\"RETHROW\"");
        assert_eq!(HandlingStrategy::Retry.to_string(), "RETRY");
    }
}
