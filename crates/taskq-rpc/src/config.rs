//! RPC client configuration (`[rpc]` table of taskq.toml)

use serde::Deserialize;
use taskq::ConfigError;

/// Knobs for driving RPCs through a task queue
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    /// Rounds `PendingRpc::wait` drives before giving up
    pub max_wait_rounds: usize,

    /// Polls the loopback transport withholds each response for
    pub loopback_latency: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_wait_rounds: 1024,
            loopback_latency: 2,
        }
    }
}

impl RpcConfig {
    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "max_wait_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
