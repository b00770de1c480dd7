//! Engine configuration.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

/// Per-instrument channel depth used by the reference deployment.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Depth of the router's inbound queue.
pub const DEFAULT_ROUTER_CAPACITY: usize = 1024;

/// Channel sizing for the router, coordinators and side actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of each coordinator and side actor inbound channel.
    pub channel_capacity: usize,
    /// Capacity of the router's inbound channel.
    pub router_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            router_capacity: DEFAULT_ROUTER_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TANDEM_CHANNEL_CAPACITY` and `TANDEM_ROUTER_CAPACITY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            channel_capacity: env_or("TANDEM_CHANNEL_CAPACITY", defaults.channel_capacity)?,
            router_capacity: env_or("TANDEM_ROUTER_CAPACITY", defaults.router_capacity)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_router_capacity(mut self, capacity: usize) -> Self {
        self.router_capacity = capacity;
        self
    }

    /// Tokio channels panic on zero capacity, so reject it up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity { name: "channel_capacity" });
        }
        if self.router_capacity == 0 {
            return Err(ConfigError::ZeroCapacity { name: "router_capacity" });
        }
        Ok(())
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
pub fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}
