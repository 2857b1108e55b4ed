//! Drive an MCP server from configuration
//!
//! Reads `tether.toml` (if present) and `TETHER_*` variables, performs the
//! handshake, lists the server's tools and, when `TETHER_DEMO_TOOL` is set,
//! calls that tool with the JSON arguments in `TETHER_DEMO_ARGS`.
//!
//! ```text
//! TETHER_SERVER_COMMAND=go TETHER_SERVER_ARGS="run main.go serve --transport stdio" \
//! TETHER_DEMO_TOOL=advanced_list TETHER_DEMO_ARGS='{"format":"json"}' \
//!     cargo run --example call_tool
//! ```

use anyhow::Context;
use serde_json::Value;
use tether_core::{ConfigLoader, McpClient, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_file("tether.toml")
        .with_env()
        .load()?;
    logging::init(&config.logging)?;

    println!("Starting {}", config.server.display_command());
    let mut client = McpClient::spawn(&config.server, config.client.clone())?;

    let init = client.handshake().await?;
    println!(
        "Connected to {} {} (protocol {})",
        init.server_info.name, init.server_info.version, init.protocol_version
    );

    let tools = client.list_tools().await?;
    println!("\n{} tools:", tools.len());
    for tool in &tools {
        println!(
            "  {:<24} {}",
            tool.name,
            tool.description.as_deref().unwrap_or("")
        );
    }

    if let Ok(name) = std::env::var("TETHER_DEMO_TOOL") {
        let arguments: Value = match std::env::var("TETHER_DEMO_ARGS") {
            Ok(raw) => serde_json::from_str(&raw).context("TETHER_DEMO_ARGS is not JSON")?,
            Err(_) => Value::Object(Default::default()),
        };

        println!("\nCalling {} {}", name, arguments);
        match client.call_tool(&name, arguments, None).await {
            Ok(result) if result.is_error => println!("Tool reported an error:\n{}", result.text()),
            Ok(result) => println!("{}", result.text()),
            Err(e) => println!("Call failed [{}]: {}", e.error_code(), e),
        }
    }

    let report = client.close().await?;
    println!("\nServer exited with {:?}", report.exit_code);
    if !report.stderr.is_empty() {
        println!("Server stderr:\n{}", report.stderr);
    }
    Ok(())
}
