//! taskq.toml loading
//!
//! ```toml
//! [queue]
//! initial_capacity = 64
//! max_tasks = 1024
//!
//! [rpc]
//! max_wait_rounds = 256
//! loopback_latency = 3
//! ```

use anyhow::Context as _;
use serde::Deserialize;
use std::path::Path;
use taskq::{ConfigError, QueueConfig};
use taskq_rpc::RpcConfig;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "taskq.toml";

/// Contents of taskq.toml
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// `[queue]` table
    pub queue: QueueConfig,

    /// `[rpc]` table
    pub rpc: RpcConfig,
}

impl CliConfig {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: CliConfig = toml::from_str(content)?;
        config.queue.validate()?;
        config.rpc.validate()?;
        Ok(config)
    }

    /// Load the explicit config file, else ./taskq.toml if present, else defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path)
                .with_context(|| format!("loading config {}", path.display()));
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            tracing::debug!(path = %fallback.display(), "using config from working directory");
            return Self::from_file(fallback)
                .with_context(|| format!("loading config {}", fallback.display()));
        }
        Ok(Self::default())
    }
}
