//! MCP error types

use crate::protocol::{McpRpcError, RequestId};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for MCP client operations
pub type McpResult<T> = Result<T, McpError>;

/// Errors surfaced by the client.
///
/// Malformed lines on the server's output never show up here: the correlator
/// absorbs them as noise (see [`crate::codec::CodecError`]).
#[derive(Debug, Error, Clone)]
pub enum McpError {
    /// The server process could not be started
    #[error("Failed to spawn MCP server '{command}': {message}")]
    Spawn { command: String, message: String },

    /// No matching response arrived before the deadline
    #[error("Timeout waiting for response to request {id} (method: {method}) after {elapsed:?}")]
    Timeout {
        id: RequestId,
        method: String,
        elapsed: Duration,
        /// Incomplete line buffered when the wait expired
        partial_output: Option<String>,
    },

    /// The server process exited while an exchange was outstanding
    #[error("Server process died. Exit code: {}, stderr: {stderr}", display_exit_code(.exit_code))]
    ProcessTerminated {
        id: Option<RequestId>,
        method: Option<String>,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The server closed its output stream while a request was outstanding
    #[error("Server closed its output while waiting for request {id} (method: {method})")]
    StreamClosed {
        id: RequestId,
        method: String,
        stderr: String,
    },

    /// Well-formed error response from the server
    #[error("Server error {code}: {message} (request {id}, method: {method})")]
    Server {
        id: RequestId,
        method: String,
        code: i64,
        message: String,
        /// The `error` member exactly as the server sent it
        payload: Value,
    },

    /// A result did not have the expected shape
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Writing to or reading from the server failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Not initialized
    #[error("Client not initialized")]
    NotInitialized,

    /// Already initialized
    #[error("Client already initialized")]
    AlreadyInitialized,

    /// The client was closed
    #[error("Client is not connected")]
    NotConnected,
}

fn display_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

impl McpError {
    /// Create a new Spawn error
    pub fn spawn(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a new Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build a Server error from a raw `error` payload.
    ///
    /// Code and message are read from the payload when it follows the
    /// JSON-RPC error object shape; the payload itself is kept unchanged.
    pub fn server(id: RequestId, method: impl Into<String>, payload: Value) -> Self {
        let (code, message) = match McpRpcError::from_value(&payload) {
            Some(rpc) => (rpc.code, rpc.message),
            None => (0, payload.to_string()),
        };
        Self::Server {
            id,
            method: method.into(),
            code,
            message,
            payload,
        }
    }

    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "MCP_SPAWN",
            Self::Timeout { .. } => "MCP_TIMEOUT",
            Self::ProcessTerminated { .. } => "MCP_PROCESS_TERMINATED",
            Self::StreamClosed { .. } => "MCP_STREAM_CLOSED",
            Self::Server { .. } => "MCP_SERVER",
            Self::Protocol { .. } => "MCP_PROTOCOL",
            Self::Transport { .. } => "MCP_TRANSPORT",
            Self::Serialization { .. } => "MCP_SERIALIZATION",
            Self::Config { .. } => "MCP_CONFIG",
            Self::NotInitialized => "MCP_NOT_INITIALIZED",
            Self::AlreadyInitialized => "MCP_ALREADY_INITIALIZED",
            Self::NotConnected => "MCP_NOT_CONNECTED",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    ///
    /// The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Captured server stderr attached to this error, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ProcessTerminated { stderr, .. } | Self::StreamClosed { stderr, .. } => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}
