//! Queue configuration (`[queue]` table of taskq.toml)

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Sizing knobs for a [`TaskQueue`](crate::TaskQueue)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Slots pre-allocated for the arena and the pending sequence
    pub initial_capacity: usize,

    /// Upper bound on registered tasks (None = unlimited)
    pub max_tasks: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_tasks: None,
        }
    }
}

impl QueueConfig {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: QueueConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.max_tasks {
            if max == 0 {
                return Err(ConfigError::ValidationError(
                    "max_tasks must be at least 1".to_string(),
                ));
            }
            if self.initial_capacity > max {
                return Err(ConfigError::ValidationError(format!(
                    "initial_capacity ({}) exceeds max_tasks ({})",
                    self.initial_capacity, max
                )));
            }
        }
        Ok(())
    }
}
