//! Tether Core Library
//!
//! Drives a Model Context Protocol (MCP) server as a child process over
//! newline-delimited JSON-RPC on its stdin and stdout.
//!
//! ## Features
//!
//! - Process supervision with stderr capture and bounded shutdown
//! - Deadline-bounded waits that notice a dead server promptly
//! - Responses matched by id, with notifications and log noise tolerated
//! - Layered configuration (files plus `TETHER_*` variables)
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::{ClientOptions, McpClient, ServerConfig};
//!
//! let server = ServerConfig::new("go").with_args(["run", "main.go", "serve"]);
//! let mut client = McpClient::spawn(&server, ClientOptions::default())?;
//!
//! client.handshake().await?;
//! let result = client
//!     .call_tool("advanced_list", json!({"format": "json"}), None)
//!     .await?;
//! println!("{}", result.text());
//! client.close().await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::{LoggingNotificationHandler, McpClient, SyncNotificationHandler};
pub use config::{ClientOptions, ConfigLoader, LoggingConfig, ServerConfig, TetherConfig};
pub use error::{McpError, McpResult};
pub use protocol::{McpMessage, McpNotification, McpRequest, McpResponse, RequestId};
pub use transport::{ExitReport, McpTransport, StdioTransport};
pub use types::{
    ClientInfo, InitializeResult, McpCapabilities, McpContent, McpServerInfo, McpTool,
    McpToolResult,
};
