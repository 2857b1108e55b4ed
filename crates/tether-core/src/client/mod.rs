//! MCP client implementation
//!
//! [`McpClient`] drives one server session over a [`McpTransport`]. Requests
//! are issued one at a time: every operation takes `&mut self`, and the wait
//! for a response happens inline, reading the server's output until the
//! matching id shows up, the deadline passes, or the server dies.

pub mod correlator;
mod notification;
mod operations;


pub use correlator::{Correlator, PendingRequest, RequestState};
pub use notification::{LoggingNotificationHandler, SyncNotificationHandler};

use crate::config::{ClientOptions, ServerConfig};
use crate::error::McpError;
use crate::protocol::{McpMessage, McpNotification, McpRequest, RequestId};
use crate::transport::{ExitReport, McpTransport, StdioTransport};
use crate::types::{InitializeResult, McpServerInfo, McpTool};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// MCP client for one server session
pub struct McpClient {
    /// Transport layer
    transport: Box<dyn McpTransport>,
    /// Id allocation and response matching
    correlator: Correlator,
    /// Timing and handshake options
    options: ClientOptions,
    /// Notification handler
    notification_handler: Box<dyn SyncNotificationHandler>,
    /// Result of `initialize`, once it succeeded
    init_result: Option<InitializeResult>,
    /// Cached tools
    tools: Vec<McpTool>,
    /// Whether `close` has run
    closed: bool,
}

impl McpClient {
    /// Create a client over an existing transport
    pub fn new(transport: Box<dyn McpTransport>, options: ClientOptions) -> Self {
        Self {
            transport,
            correlator: Correlator::new(options.poll_interval),
            options,
            notification_handler: Box::new(LoggingNotificationHandler),
            init_result: None,
            tools: Vec::new(),
            closed: false,
        }
    }

    /// Spawn the server described by `config` and connect to it over stdio
    ///
    /// Must be called from within a Tokio runtime: the child process and
    /// its stderr drain task are both spawned on the current runtime.
    pub fn spawn(config: &ServerConfig, options: ClientOptions) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(config)?;
        info!(
            command = %config.display_command(),
            pid = ?transport.pid(),
            "MCP server started"
        );
        Ok(Self::new(Box::new(transport), options))
    }

    /// Set a custom notification handler
    pub fn set_notification_handler(&mut self, handler: Box<dyn SyncNotificationHandler>) {
        self.notification_handler = handler;
    }

    /// Options this client was created with
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Check if the client is initialized
    pub fn is_initialized(&self) -> bool {
        self.init_result.is_some()
    }

    /// Whether the session is still open
    pub fn is_connected(&self) -> bool {
        !self.closed && self.transport.is_connected()
    }

    /// Full `initialize` result
    pub fn init_result(&self) -> Option<&InitializeResult> {
        self.init_result.as_ref()
    }

    /// Get server info
    pub fn server_info(&self) -> Option<&McpServerInfo> {
        self.init_result.as_ref().map(|r| &r.server_info)
    }

    /// Tools from the last successful `list_tools`
    pub fn cached_tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Number of requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Send a notification. No id is allocated and nothing is awaited.
    pub async fn send_notification(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), McpError> {
        self.ensure_connected()?;

        let mut notification = McpNotification::new(method);
        if let Some(params) = params {
            notification = notification.with_params(params);
        }

        if let Err(e) = self
            .transport
            .send(&McpMessage::Notification(notification))
            .await
        {
            return Err(self.send_failure(e, None, method).await);
        }
        debug!("Sent notification {}", method);
        Ok(())
    }

    /// Close the session.
    ///
    /// Closes the server's stdin, waits up to the configured grace period for
    /// it to exit, and kills it otherwise. Captured stderr is returned in the
    /// report rather than raised. Closing twice returns an empty report.
    pub async fn close(&mut self) -> Result<ExitReport, McpError> {
        if self.closed {
            return Ok(ExitReport::default());
        }
        self.closed = true;

        let report = self.transport.close(self.options.shutdown_grace).await?;
        if !report.stderr.trim().is_empty() {
            warn!("MCP server stderr during session:\n{}", report.stderr.trim_end());
        }
        info!(
            exit_code = ?report.exit_code,
            forced = report.forced,
            "MCP session closed"
        );

        self.init_result = None;
        Ok(report)
    }

    /// Issue a request and wait for its result
    pub(crate) async fn call(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, McpError> {
        self.ensure_connected()?;

        let deadline = Instant::now() + timeout.unwrap_or(self.options.request_timeout);
        let id = self.correlator.register(method);

        let mut request = McpRequest::new(id.clone(), method);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        if let Err(e) = self.transport.send(&McpMessage::Request(request)).await {
            self.correlator.abandon(&id, RequestState::Aborted);
            return Err(self.send_failure(e, Some(&id), method).await);
        }
        debug!(%id, "Sent request {}", method);

        self.correlator
            .await_response(
                self.transport.as_mut(),
                &id,
                deadline,
                self.notification_handler.as_ref(),
            )
            .await
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::NotConnected);
        }
        Ok(())
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), McpError> {
        self.ensure_connected()?;
        if self.init_result.is_none() {
            return Err(McpError::NotInitialized);
        }
        Ok(())
    }

    /// Turn a failed write into `ProcessTerminated` when the server is gone
    async fn send_failure(
        &mut self,
        error: McpError,
        id: Option<&RequestId>,
        method: &str,
    ) -> McpError {
        if matches!(error, McpError::NotConnected) {
            return error;
        }
        match correlator::wait_for_exit(self.transport.as_mut(), self.options.poll_interval).await
        {
            Some(exit_code) => McpError::ProcessTerminated {
                id: id.cloned(),
                method: Some(method.to_string()),
                exit_code,
                stderr: self.transport.stderr_output().await,
            },
            None => error,
        }
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("options", &self.options)
            .field("server", &self.server_info().map(|s| s.name.as_str()))
            .field("pending", &self.correlator.pending_count())
            .field("closed", &self.closed)
            .finish()
    }
}
