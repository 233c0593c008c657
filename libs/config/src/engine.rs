//! Engine Configuration Module
//!
//! Loads [`EngineConfig`] from defaults, an optional TOML file and
//! environment overrides, in that order of increasing precedence.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use types::DEFAULT_BUFFER_CAPACITY;

/// Prefix of environment overrides, e.g. `DISPATCH_BUFFER_CAPACITY`
pub const ENV_PREFIX: &str = "DISPATCH";

/// Tunables of the message engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of every buffer allocated for message content
    pub buffer_capacity: usize,

    /// Largest message the receive loop accepts; unlimited when unset
    pub max_message_size: Option<usize>,

    /// Tracing filter directive, e.g. `"info"` or `"message=debug,warn"`
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_message_size: None,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration, overriding defaults with `path` (if given) and then
    /// with `DISPATCH_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// [`EngineConfig::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let defaults = toml::to_string(&Self::default()).context("Failed to serialize default configuration")?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = path {
            info!("Loading engine config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(env_prefix).try_parsing(true));

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(?config, "engine configuration loaded");
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            bail!("buffer_capacity must be greater than zero");
        }
        if let Some(limit) = self.max_message_size {
            if limit < self.buffer_capacity {
                bail!(
                    "max_message_size ({limit}) is smaller than one buffer ({})",
                    self.buffer_capacity
                );
            }
        }
        if self.log_filter.trim().is_empty() {
            bail!("log_filter must not be empty");
        }
        Ok(())
    }

    /// Set the buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the message size limit
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = Some(limit);
        self
    }
}
