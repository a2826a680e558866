//! # orrery-log
//!
//! Structured logging setup for Orrery binaries.
//!
//! Libraries in the workspace only emit `tracing` events; a binary calls
//! [`init`] (or builds a [`LoggerBuilder`] from a [`Config`]) once at
//! startup and keeps the returned [`LoggerGuard`] alive.
//!
//! ```rust,ignore
//! let _guard = orrery_log::init()?;
//! tracing::info!(instance_id = %id, "process instance started");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

/// Initialize logging from `ORRERY_LOG` / `RUST_LOG` and `ORRERY_LOG_FORMAT`.
pub fn init() -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(Config::from_env()).build()
}

/// Initialize logging with an explicit configuration.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
