//! Handler faults.

use orrery_definition::HandlingStrategy;

use crate::item::DataMap;

/// Failure raised by a handler's `execute`.
///
/// A fault is plain data: it names the recovery the handler wants (or
/// leaves it to the node's configured default) and may carry partial
/// results for the COMPLETE strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerFault {
    /// Human-readable cause.
    pub message: String,
    /// Requested strategy; `None` defers to the node or engine default.
    pub strategy: Option<HandlingStrategy>,
    /// Results produced before the failure.
    pub partial_results: DataMap,
}

impl HandlerFault {
    /// A fault that defers strategy selection.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            strategy: None,
            partial_results: DataMap::new(),
        }
    }

    /// A fault requesting the given strategy.
    pub fn with_strategy(message: impl Into<String>, strategy: HandlingStrategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Self::new(message)
        }
    }

    /// Complete the work item anyway.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::with_strategy(message, HandlingStrategy::Complete)
    }

    /// Abort the work item.
    pub fn abort(message: impl Into<String>) -> Self {
        Self::with_strategy(message, HandlingStrategy::Abort)
    }

    /// Put the instance into ERROR.
    pub fn rethrow(message: impl Into<String>) -> Self {
        Self::with_strategy(message, HandlingStrategy::Rethrow)
    }

    /// Ask for the work item to be executed again.
    pub fn retry(message: impl Into<String>) -> Self {
        Self::with_strategy(message, HandlingStrategy::Retry)
    }

    /// Attach partial results.
    #[must_use]
    pub fn with_partial_results(mut self, results: DataMap) -> Self {
        self.partial_results = results;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_set_strategy() {
        assert_eq!(HandlerFault::new("x").strategy, None);
        assert_eq!(
            HandlerFault::abort("x").strategy,
            Some(HandlingStrategy::Abort)
        );
        assert_eq!(
            HandlerFault::retry("x").strategy,
            Some(HandlingStrategy::Retry)
        );
    }

    #[test]
    fn displays_message() {
        let fault = HandlerFault::complete("backend unavailable")
            .with_partial_results(DataMap::from([("n".to_owned(), json!(1))]));
        assert_eq!(fault.to_string(), "backend unavailable");
        assert_eq!(fault.partial_results.len(), 1);
    }
}
