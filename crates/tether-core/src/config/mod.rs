//! Configuration for launching a server and driving a session
//!
//! A [`TetherConfig`] bundles what to spawn ([`ServerConfig`]), how the
//! client waits ([`ClientOptions`]) and how it logs ([`LoggingConfig`]).
//! [`ConfigLoader`] layers files and `TETHER_*` variables on top of the
//! defaults.

pub mod loader;
pub mod logging;
pub mod options;
pub mod server;

pub use loader::{ConfigLoader, ConfigSource};
pub use logging::LoggingConfig;
pub use options::ClientOptions;
pub use server::ServerConfig;

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
    /// Server to spawn
    #[serde(default)]
    pub server: ServerConfig,
    /// Client behaviour
    #[serde(default)]
    pub client: ClientOptions,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TetherConfig {
    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), McpError> {
        if self.server.command.trim().is_empty() {
            return Err(McpError::config("server command must not be empty"));
        }

        let durations = [
            ("request_timeout", self.client.request_timeout),
            ("poll_interval", self.client.poll_interval),
            ("shutdown_grace", self.client.shutdown_grace),
        ];
        for (name, value) in durations {
            if value == Duration::ZERO {
                return Err(McpError::config(format!("{} must be greater than zero", name)));
            }
        }

        if self.client.protocol_version.is_empty() {
            return Err(McpError::config("protocol_version must not be empty"));
        }

        Ok(())
    }
}
