//! Service configuration, read from the environment.

use serde::{Deserialize, Serialize};

use crate::{constants, Error, Result};

/// Configuration for a Clearbook deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Port the push/API server listens on.
    pub server_port: u16,
    /// Clearinghouse WebSocket endpoint.
    pub clearinghouse_url: String,
    /// Hex-encoded broker private key. Empty disables the channel subsystem.
    pub broker_private_key: String,
    /// On-chain adjudicator contract address.
    pub adjudicator_addr: String,
    /// Quote asset identifier used in channel allocations.
    pub default_asset: String,
}

impl ServiceConfig {
    /// Read configuration from environment variables, falling back to
    /// defaults where a variable is unset.
    ///
    /// # Errors
    /// Returns `Configuration` if `SERVER_PORT` is set but not a valid port.
    pub fn from_env() -> Result<Self> {
        let server_port = match std::env::var("SERVER_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Configuration(format!("invalid SERVER_PORT: {raw:?}")))?,
            Err(_) => constants::DEFAULT_SERVER_PORT,
        };

        Ok(Self {
            server_port,
            clearinghouse_url: env_or("CLEARINGHOUSE_URL", "wss://clearnet.yellow.com/ws"),
            broker_private_key: env_or("BROKER_PRIVATE_KEY", ""),
            adjudicator_addr: env_or(
                "ADJUDICATOR_ADDR",
                "0x33eA68432d7657CA49Db36f378A95c6c71d3BDF1",
            ),
            default_asset: env_or(
                "DEFAULT_ASSET",
                "0x0000000000000000000000000000000000000000",
            ),
        })
    }

    /// Whether the channel subsystem should be started at all.
    #[must_use]
    pub fn channel_enabled(&self) -> bool {
        !self.broker_private_key.is_empty()
    }

    /// The socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.server_port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_port: constants::DEFAULT_SERVER_PORT,
            clearinghouse_url: "wss://clearnet.yellow.com/ws".to_string(),
            broker_private_key: String::new(),
            adjudicator_addr: "0x33eA68432d7657CA49Db36f378A95c6c71d3BDF1".to_string(),
            default_asset: "0x0000000000000000000000000000000000000000".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}
