//! TOML file configuration structures.
//!
//! These structs directly map to the `pollbus-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Shared secret for the admin publish endpoint.
    pub secret: String,
}

/// Bus timing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSection {
    /// Blocking-poll timeout in seconds. The catch-up window equals it
    /// and the GC retention window is double it.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_poll_timeout_secs() -> u64 {
    50
}

/// One tenant and the bearer tokens that resolve to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [server]

            [admin]
            secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.bus.poll_timeout_secs, 50);
        assert!(config.tenants.is_empty());
    }

    #[test]
    fn tenants_and_timeout_parse() {
        let config: FileConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9000"

            [admin]
            secret = "s3cret"

            [bus]
            poll_timeout_secs = 25

            [[tenants]]
            name = "acme"
            tokens = ["tok-1", "tok-2"]
            "#,
        )
        .unwrap();

        assert_eq!(config.bus.poll_timeout_secs, 25);
        assert_eq!(config.tenants.len(), 1);
        assert_eq!(config.tenants[0].name, "acme");
        assert_eq!(config.tenants[0].tokens.len(), 2);
    }
}
