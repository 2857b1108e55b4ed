//! Client timing and handshake options

use crate::protocol::MCP_PROTOCOL_VERSION;
use crate::types::ClientInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout (30 seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default read slice between liveness checks (100 milliseconds)
pub const POLL_INTERVAL_MS: u64 = 100;

/// Default wait for the server to exit after stdin is closed (5 seconds)
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

fn default_request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(POLL_INTERVAL_MS)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(SHUTDOWN_GRACE_SECS)
}

fn default_protocol_version() -> String {
    MCP_PROTOCOL_VERSION.to_string()
}

/// Options for [`crate::client::McpClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Deadline for a request when the caller gives none
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Longest single read before liveness and deadline are re-checked
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// How long `close` waits for the server before killing it
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
    /// Protocol version sent by `handshake`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Client identity sent by `handshake`
    #[serde(default)]
    pub client_info: ClientInfo,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            poll_interval: default_poll_interval(),
            shutdown_grace: default_shutdown_grace(),
            protocol_version: default_protocol_version(),
            client_info: ClientInfo::default(),
        }
    }
}

impl ClientOptions {
    /// Set the default request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the client identity
    pub fn with_client_info(mut self, info: ClientInfo) -> Self {
        self.client_info = info;
        self
    }
}
