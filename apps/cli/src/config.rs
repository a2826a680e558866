//! Layered CLI configuration: defaults, then `orrery.toml` (or `--config`),
//! then `ORRERY_*` environment variables, then flags.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use orrery_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "orrery.toml";

/// Everything the binary reads from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Engine settings.
    pub engine: EngineConfig,
    /// Logger settings.
    pub log: orrery_log::Config,
}

impl CliConfig {
    /// Build the figment for `path`, or the default file.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            // ORRERY_LOG is the logger's own level variable, not a table
            .merge(Env::prefixed("ORRERY_").split("__").ignore(&["log", "config"]))
    }

    /// Load and extract the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }
}
