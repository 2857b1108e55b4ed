//! MCP protocol operations (handshake, tools, raw requests)

use super::McpClient;
use crate::error::McpError;
use crate::protocol::methods;
use crate::types::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, McpTool, McpToolResult,
};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, instrument};

impl McpClient {
    /// Send `initialize` and store the server's answer.
    ///
    /// The caller still has to send `notifications/initialized`;
    /// [`McpClient::handshake`] does both.
    #[instrument(skip(self, client_info), level = "debug")]
    pub async fn initialize(
        &mut self,
        protocol_version: &str,
        client_info: ClientInfo,
    ) -> Result<InitializeResult, McpError> {
        self.ensure_connected()?;
        if self.is_initialized() {
            return Err(McpError::AlreadyInitialized);
        }

        let params = InitializeParams {
            protocol_version: protocol_version.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        };

        let result = self
            .call(methods::INITIALIZE, Some(serde_json::to_value(params)?), None)
            .await?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::protocol(format!("Invalid initialize result: {}", e)))?;

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );
        self.init_result = Some(result.clone());
        Ok(result)
    }

    /// `initialize` with the configured version and identity, then
    /// `notifications/initialized`
    pub async fn handshake(&mut self) -> Result<InitializeResult, McpError> {
        let protocol_version = self.options.protocol_version.clone();
        let client_info = self.options.client_info.clone();

        let result = self.initialize(&protocol_version, client_info).await?;
        self.send_notification(methods::INITIALIZED, None).await?;
        Ok(result)
    }

    /// List available tools
    #[instrument(skip(self), level = "debug")]
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        self.ensure_initialized()?;

        let mut result = self.call(methods::TOOLS_LIST, None, None).await?;
        let tools: Vec<McpTool> = match result.get_mut("tools") {
            Some(tools) => serde_json::from_value(tools.take())
                .map_err(|e| McpError::protocol(format!("Invalid tools/list result: {}", e)))?,
            None => Vec::new(),
        };

        self.tools = tools.clone();
        Ok(tools)
    }

    /// Call a tool; `timeout` overrides the default request timeout
    #[instrument(skip(self, arguments), fields(tool_name = %name))]
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<McpToolResult, McpError> {
        self.ensure_initialized()?;

        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self.call(methods::TOOLS_CALL, Some(params), timeout).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::protocol(format!("Invalid tools/call result: {}", e)))
    }

    /// Send any request and return its raw result
    #[instrument(skip(self, params), level = "debug")]
    pub async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, McpError> {
        self.call(method, params, timeout).await
    }

    /// Ping the server
    pub async fn ping(&mut self) -> Result<(), McpError> {
        self.call(methods::PING, None, None).await?;
        Ok(())
    }
}
