//! Logging setup errors.

/// Result alias for logger setup.
pub type LogResult<T> = Result<T, LogError>;

/// Failures while installing the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The level directive could not be parsed.
    #[error("invalid filter: {0}")]
    Filter(String),

    /// The format name is not known.
    #[error("unknown log format `{0}`")]
    UnknownFormat(String),

    /// A global subscriber is already installed.
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),
}
