//! Server configuration from the environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use tandem_core::config::env_or;
use tandem_core::{ConfigError, EngineConfig};
use tandem_net::GatewayConfig;

pub const DEFAULT_LISTEN_PORT: u16 = 9000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Market data destination; events are only logged when unset.
    pub feed_addr: Option<SocketAddr>,
    /// Core to pin the gateway thread to.
    pub gateway_core: Option<usize>,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    /// Reads `TANDEM_LISTEN_ADDR`, `TANDEM_FEED_ADDR`, `TANDEM_BACKLOG`,
    /// `TANDEM_MAX_IN_FLIGHT`, `TANDEM_GATEWAY_CORE` and the engine variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = GatewayConfig::default();
        Ok(Self {
            listen_addr: env_or(
                "TANDEM_LISTEN_ADDR",
                SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            )?,
            feed_addr: optional("TANDEM_FEED_ADDR")?,
            gateway_core: optional("TANDEM_GATEWAY_CORE")?,
            engine: EngineConfig::from_env()?,
            gateway: GatewayConfig {
                backlog: env_or("TANDEM_BACKLOG", defaults.backlog)?,
                max_in_flight: env_or("TANDEM_MAX_IN_FLIGHT", defaults.max_in_flight)?,
                ..defaults
            },
        })
    }
}

/// Like [`env_or`], but unset or blank means `None`.
fn optional<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_unset() {
        let value: Option<usize> = optional("TANDEM_TEST_UNSET_OPTIONAL").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_optional_parses_and_rejects() {
        env::set_var("TANDEM_TEST_FEED_ADDR", "127.0.0.1:5000");
        let addr: Option<SocketAddr> = optional("TANDEM_TEST_FEED_ADDR").unwrap();
        assert_eq!(addr, Some(SocketAddr::from(([127, 0, 0, 1], 5000))));

        env::set_var("TANDEM_TEST_GATEWAY_CORE", "first");
        let core: Result<Option<usize>, _> = optional("TANDEM_TEST_GATEWAY_CORE");
        assert_eq!(
            core,
            Err(ConfigError::InvalidValue {
                key: "TANDEM_TEST_GATEWAY_CORE",
                value: "first".to_string(),
            })
        );

        env::set_var("TANDEM_TEST_GATEWAY_CORE", "  ");
        let core: Option<usize> = optional("TANDEM_TEST_GATEWAY_CORE").unwrap();
        assert_eq!(core, None);
    }
}
