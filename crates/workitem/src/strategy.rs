//! Mapping a handler fault to a recovery action.

use std::time::Duration;

use orrery_definition::{HandlingStrategy, RetryConfig};

use crate::fault::HandlerFault;
use crate::item::DataMap;

/// What the dispatcher does after a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Complete the work item with these (possibly empty) results.
    Complete(DataMap),
    /// Abort the work item and its node instance.
    Abort,
    /// Execute again after `delay`.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
    },
    /// Put the instance into ERROR.
    Rethrow {
        /// `true` when this is a RETRY whose attempt budget ran out.
        retries_exhausted: bool,
    },
}

/// Resolve the recovery for `fault`.
///
/// `default_strategy` applies when the fault names none. `attempt` is the
/// 0-indexed execution that just faulted; RETRY is honoured while another
/// execution fits in `retry`'s budget and degrades to RETHROW afterwards.
#[must_use]
pub fn resolve_strategy(
    fault: &HandlerFault,
    default_strategy: HandlingStrategy,
    attempt: u32,
    retry: &RetryConfig,
) -> RecoveryAction {
    match fault.strategy.unwrap_or(default_strategy) {
        HandlingStrategy::Complete => RecoveryAction::Complete(fault.partial_results.clone()),
        HandlingStrategy::Abort => RecoveryAction::Abort,
        HandlingStrategy::Rethrow => RecoveryAction::Rethrow {
            retries_exhausted: false,
        },
        HandlingStrategy::Retry if attempt.saturating_add(1) < retry.attempt_budget() => {
            RecoveryAction::Retry {
                delay: retry.delay_for_attempt(attempt),
            }
        }
        HandlingStrategy::Retry => RecoveryAction::Rethrow {
            retries_exhausted: true,
        },
    }
}
