//! Correlation keys matching external events to waiting node instances.

use serde::{Deserialize, Serialize};

/// Opaque handle returned by a timer service for one scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(String);

impl TimerHandle {
    /// Wrap a service-issued handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an event-wait node instance is registered under.
///
/// Keys match exactly: a plain signal never resolves a correlated wait on the
/// same name, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CorrelationKey {
    /// A named signal.
    Signal {
        /// Signal name.
        name: String,
    },
    /// A named message disambiguated by correlation data.
    Correlated {
        /// Message name.
        name: String,
        /// Correlation data, e.g. an order number.
        data: String,
    },
    /// A scheduled timer.
    Timer {
        /// Handle issued by the timer service.
        handle: TimerHandle,
    },
}

impl CorrelationKey {
    /// Key for a plain signal.
    #[must_use]
    pub fn signal(name: impl Into<String>) -> Self {
        Self::Signal { name: name.into() }
    }

    /// Key for a correlated message.
    #[must_use]
    pub fn correlated(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Correlated {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Key for a timer.
    #[must_use]
    pub fn timer(handle: TimerHandle) -> Self {
        Self::Timer { handle }
    }

    /// Returns `true` for timer keys.
    #[must_use]
    pub fn is_timer(&self) -> bool {
        matches!(self, Self::Timer { .. })
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal { name } => write!(f, "signal:{name}"),
            Self::Correlated { name, data } => write!(f, "message:{name}[{data}]"),
            Self::Timer { handle } => write!(f, "timer:{handle}"),
        }
    }
}
