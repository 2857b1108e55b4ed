//! MCP type definitions

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::McpError;

/// Server information returned after initialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerInfo {
    /// Server name
    #[serde(default)]
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: String,
}

/// Server capabilities
///
/// Each capability is kept as raw JSON; presence is what matters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCapabilities {
    /// Tool capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Resource capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    /// Prompt capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
    /// Logging capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    /// Anything else the server advertises
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl McpCapabilities {
    /// Whether the server advertises tool support
    pub fn supports_tools(&self) -> bool {
        self.tools.is_some()
    }
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: Option<String>,
    /// Input schema (JSON Schema)
    #[serde(default)]
    pub input_schema: Value,
}

/// MCP tool execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolResult {
    /// Result content
    #[serde(default)]
    pub content: Vec<McpContent>,
    /// Whether the execution produced an error
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    /// All text items joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Decode the first text item as JSON.
    ///
    /// Tools that wrap CLI commands print JSON documents; this turns such a
    /// result into a typed value.
    pub fn parse_text<T: DeserializeOwned>(&self) -> Result<T, McpError> {
        let text = self
            .content
            .iter()
            .find_map(|c| c.text.as_deref())
            .ok_or_else(|| McpError::protocol("tool result has no text content"))?;
        serde_json::from_str(text).map_err(|e| {
            McpError::protocol(format!("tool output is not the expected JSON: {}", e))
        })
    }
}

/// One item of a tool result's content.
///
/// Servers are loose about this shape (the `type` tag is sometimes missing),
/// so nothing beyond the struct itself is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpContent {
    /// Content type, usually "text"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Text payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Remaining fields (data, mimeType, resource, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Initialize request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version
    pub protocol_version: String,
    /// Client capabilities
    pub capabilities: ClientCapabilities,
    /// Client info
    pub client_info: ClientInfo,
}

/// Client capabilities; serialized as `{}` by default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Roots capability (for workspace roots)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,
    /// Sampling capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
}

/// Client information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl ClientInfo {
    /// Create client info
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "tether".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Initialize response
///
/// Every field is optional on the wire; a server that omits one still
/// completes the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version
    #[serde(default)]
    pub protocol_version: String,
    /// Server capabilities
    #[serde(default)]
    pub capabilities: McpCapabilities,
    /// Server info
    #[serde(default)]
    pub server_info: McpServerInfo,
    /// Free-form usage hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_params_shape() {
        let params = InitializeParams {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::new("test-client", "1.0.0"),
        };

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            })
        );
    }

    #[test]
    fn test_initialize_result_without_server_info() {
        let result: InitializeResult =
            serde_json::from_value(json!({"capabilities": {"tools": {}}})).unwrap();

        assert!(result.server_info.name.is_empty());
        assert!(result.protocol_version.is_empty());
        assert!(result.capabilities.supports_tools());
    }

    #[test]
    fn test_client_info_default() {
        let info = ClientInfo::default();
        assert_eq!(info.name, "tether");
        assert!(!info.version.is_empty());
    }

    #[test]
    fn test_tool_result_without_type_tag() {
        let result: McpToolResult =
            serde_json::from_value(json!({"content": [{"text": "[]"}], "isError": false}))
                .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.text(), "[]");
        let clusters: Vec<Value> = result.parse_text().unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_tool_result_keeps_unknown_fields() {
        let result: McpToolResult = serde_json::from_value(json!({
            "content": [{"type": "image", "data": "AAAA", "mimeType": "image/png"}]
        }))
        .unwrap();

        let item = &result.content[0];
        assert_eq!(item.kind.as_deref(), Some("image"));
        assert_eq!(item.extra["mimeType"], "image/png");
        assert!(result.parse_text::<Value>().is_err());
    }

    #[test]
    fn test_initialize_result_with_capabilities() {
        let result: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}, "experimental": {}},
            "serverInfo": {"name": "advanced", "version": "1.0.0"}
        }))
        .unwrap();

        assert!(result.capabilities.supports_tools());
        assert!(result.capabilities.other.contains_key("experimental"));
        assert_eq!(result.server_info.name, "advanced");
    }

    #[test]
    fn test_tool_definition() {
        let tool: McpTool = serde_json::from_value(json!({
            "name": "advanced_list",
            "description": "List resources",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(tool.name, "advanced_list");
        assert_eq!(tool.input_schema["type"], "object");
    }
}
