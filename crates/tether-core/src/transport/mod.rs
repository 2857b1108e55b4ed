//! MCP transport layer
//!
//! The client talks to a server through [`McpTransport`]. The stdio
//! implementation combines a [`ProcessSupervisor`] (process lifecycle and
//! stderr capture) with a [`LineReader`] over the server's stdout.

pub mod line_reader;
pub mod process;
pub mod stdio;

#[cfg(test)]
pub(crate) mod scripted;

pub use line_reader::{LineRead, LineReader};
pub use process::{ExitReport, Liveness, ProcessSupervisor};
pub use stdio::StdioTransport;

use crate::error::McpError;
use crate::protocol::McpMessage;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send {
    /// Serialize and write one message
    async fn send(&mut self, message: &McpMessage) -> Result<(), McpError>;

    /// Read the next line, waiting no later than `deadline`
    async fn read_line(&mut self, deadline: Instant) -> Result<LineRead, McpError>;

    /// Non-blocking check on the server process
    fn liveness(&mut self) -> Liveness;

    /// Server stderr captured so far
    async fn stderr_output(&mut self) -> String;

    /// Incomplete output line buffered by the reader, if any
    fn partial_output(&self) -> Option<String> {
        None
    }

    /// Close the server's input and wait up to `grace` for it to exit
    async fn close(&mut self, grace: Duration) -> Result<ExitReport, McpError>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;
}
