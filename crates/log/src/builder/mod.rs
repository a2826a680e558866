//! Logger builder implementation

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DisplayConfig, Format};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// Hold it for the lifetime of the process. Dropping it emits a final
/// debug event; the global subscriber itself stays installed.
#[derive(Debug)]
pub struct LoggerGuard {
    format: Format,
}

impl LoggerGuard {
    /// The format the installed subscriber writes.
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        tracing::debug!("logger shutting down");
    }
}

/// Apply display options to a fmt layer of any format.
macro_rules! create_fmt_layer {
    ($layer:expr, $display:expr) => {{
        let display: &DisplayConfig = $display;
        let layer = $layer
            .with_ansi(display.colors)
            .with_target(display.target)
            .with_file(display.source)
            .with_line_number(display.source)
            .with_thread_names(display.thread_names)
            .with_writer(std::io::stderr);
        if display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the level directive without installing anything.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if the filter does not parse or a subscriber is
    /// already installed.
    pub fn build(self) -> LogResult<LoggerGuard> {
        use tracing_subscriber::Layer;

        let filter = self.filter()?;
        let display = &self.config.display;
        let fmt_layer = match self.config.format {
            Format::Pretty => create_fmt_layer!(fmt::layer().pretty(), display),
            Format::Compact => create_fmt_layer!(fmt::layer().compact(), display),
            Format::Json => create_fmt_layer!(
                fmt::layer()
                    .json()
                    .flatten_event(display.flatten)
                    .with_current_span(true),
                display
            ),
        };

        Registry::default()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        tracing::debug!(format = %self.config.format, level = %self.config.level, "logger initialized");
        Ok(LoggerGuard {
            format: self.config.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_reported() {
        let builder = LoggerBuilder::from_config(Config::test().with_level("orrery=notalevel"));
        assert!(matches!(builder.filter(), Err(LogError::Filter(_))));
    }

    #[test]
    fn second_install_is_rejected() {
        let first = LoggerBuilder::from_config(Config::test()).build();
        let second = LoggerBuilder::from_config(Config::test()).build();
        assert!(first.is_ok());
        assert!(matches!(second, Err(LogError::AlreadyInitialized(_))));
    }
}
