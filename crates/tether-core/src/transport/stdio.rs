//! Standard I/O transport for MCP
//!
//! Spawns a subprocess and communicates via stdin/stdout.

use super::line_reader::{LineRead, LineReader};
use super::process::{ExitReport, Liveness, ProcessSupervisor};
use super::McpTransport;
use crate::codec;
use crate::config::ServerConfig;
use crate::error::McpError;
use crate::protocol::McpMessage;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::ChildStdout;
use tokio::time::Instant;
use tracing::trace;

/// Stdio transport for MCP communication
pub struct StdioTransport {
    /// Server process (owns stdin and the stderr capture)
    process: ProcessSupervisor,
    /// Line reader over the server's stdout
    reader: LineReader<ChildStdout>,
    /// Whether connected
    connected: bool,
}

impl StdioTransport {
    /// Spawn a new MCP server process
    pub fn spawn(config: &ServerConfig) -> Result<Self, McpError> {
        let mut process = ProcessSupervisor::spawn(config)?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| McpError::spawn(&config.command, "failed to get stdout handle"))?;

        Ok(Self {
            process,
            reader: LineReader::new(stdout),
            connected: true,
        })
    }

    /// OS process id of the server
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&mut self, message: &McpMessage) -> Result<(), McpError> {
        if !self.connected {
            return Err(McpError::NotConnected);
        }

        let line = codec::encode(message)?;
        trace!(id = ?message.id(), method = ?message.method(), "-> {}", line.trim_end());
        self.process.write_line(&line).await?;
        Ok(())
    }

    async fn read_line(&mut self, deadline: Instant) -> Result<LineRead, McpError> {
        let read = self.reader.read_line(deadline).await?;
        if let LineRead::Line(line) = &read {
            trace!("<- {}", line);
        }
        Ok(read)
    }

    fn liveness(&mut self) -> Liveness {
        self.process.liveness()
    }

    async fn stderr_output(&mut self) -> String {
        self.process.stderr_output().await
    }

    fn partial_output(&self) -> Option<String> {
        self.reader.partial()
    }

    async fn close(&mut self, grace: Duration) -> Result<ExitReport, McpError> {
        self.connected = false;
        self.process.terminate(grace).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
