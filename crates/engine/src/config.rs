//! Engine configuration.

use orrery_definition::{HandlingStrategy, RetryConfig};
use serde::{Deserialize, Serialize};

/// Engine-wide settings. Every field has a default, so partial
/// configuration files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reject writes to undeclared variables.
    pub strict_variables: bool,
    /// Strategy for faults that name none on a task that configures none.
    pub default_strategy: HandlingStrategy,
    /// Retry policy for tasks without their own.
    pub retry: RetryConfig,
    /// Journal entries kept per instance; 0 keeps everything.
    pub journal_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_variables: false,
            default_strategy: HandlingStrategy::Rethrow,
            retry: RetryConfig::default(),
            journal_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Toggle strict variable handling.
    #[must_use]
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// Set the engine-wide default strategy.
    #[must_use]
    pub fn with_default_strategy(mut self, strategy: HandlingStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Set the engine-wide retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-instance journal capacity.
    #[must_use]
    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert!(!cfg.strict_variables);
        assert_eq!(cfg.default_strategy, HandlingStrategy::Rethrow);
        assert_eq!(cfg.retry.attempt_budget(), 3);
        assert_eq!(cfg.journal_capacity, 1024);
    }

    #[test]
    fn partial_input_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"strict_variables": true, "default_strategy": "ABORT"}"#)
                .unwrap();
        assert_eq!(
            cfg,
            EngineConfig::default()
                .with_strict_variables(true)
                .with_default_strategy(HandlingStrategy::Abort)
        );
    }
}
