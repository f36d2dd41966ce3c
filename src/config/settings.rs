use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Capacity of each connection's outbound queue. When a client reads
    /// slower than peers write to it, frames past this bound are dropped
    /// rather than stalling the senders.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_outbound_capacity() -> usize {
    64
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("relay.outbound_capacity", 64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, JWT_SECRET, RELAY_OUTBOUND_CAPACITY, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder
            .build()?
            .try_deserialize()
            .map_err(AppError::Config)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let relay = RelayConfig::default();
        assert_eq!(relay.outbound_capacity, 64);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9000,
            },
            jwt: JwtConfig {
                secret: "s".to_string(),
                issuer: None,
                audience: None,
            },
            relay: RelayConfig::default(),
        };
        assert_eq!(settings.server_addr(), "127.0.0.1:9000");
    }
}
