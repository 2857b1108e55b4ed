//! End-to-end sessions against real child processes
//!
//! Each server is a small `sh` script that answers by matching on the method
//! name in each request line and echoing the request id back.

#![cfg(unix)]

use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tether_core::{ClientOptions, McpClient, McpError, ServerConfig};

/// Pulls the numeric id out of the request line in `$line`
const EXTRACT_ID: &str = r#"id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')"#;

const INIT_RESULT: &str = r#"{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh-server","version":"0.1.0"}}"#;

fn server(body: &str) -> ServerConfig {
    let script = format!(
        r#"echo "sh-server starting" >&2
while IFS= read -r line; do
  {EXTRACT_ID}
  case "$line" in
    *'"method":"initialize"'*)
      echo "{{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{INIT}}}" ;;
{body}
  esac
done"#,
        EXTRACT_ID = EXTRACT_ID,
        INIT = INIT_RESULT.replace('"', "\\\""),
        body = body,
    );
    ServerConfig::new("sh").with_args(["-c", script.as_str()])
}

fn options() -> ClientOptions {
    ClientOptions::default()
        .with_request_timeout(Duration::from_secs(10))
        .with_poll_interval(Duration::from_millis(20))
        .with_shutdown_grace(Duration::from_secs(2))
}

#[tokio::test]
async fn test_full_session_with_noisy_server() -> anyhow::Result<()> {
    let config = server(
        r#"    *'"method":"tools/list"'*)
      echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"tools\":[{\"name\":\"advanced_list\",\"inputSchema\":{\"type\":\"object\"}}]}}" ;;
    *'"method":"tools/call"'*)
      echo "2024/05/01 12:00:00 executing advanced_list"
      echo '{"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":1}}'
      echo '{"jsonrpc":"2.0","id":999,"result":{}}'
      echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"text\":\"[]\"}]}}" ;;"#,
    );
    let mut client = McpClient::spawn(&config, options())?;

    let init = client.handshake().await?;
    assert_eq!(init.server_info.name, "sh-server");

    let tools = client.list_tools().await?;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "advanced_list");

    let result = client
        .call_tool("advanced_list", json!({"format": "json"}), None)
        .await?;
    let items: Vec<Value> = result.parse_text()?;
    assert!(items.is_empty());

    let report = client.close().await?;
    assert_eq!(report.exit_code, Some(0));
    assert!(!report.forced);
    assert!(report.stderr.contains("sh-server starting"));
    Ok(())
}

#[tokio::test]
async fn test_missing_executable_fails_to_spawn() {
    let config = ServerConfig::new("/nonexistent/tether-test-server");
    let err = McpClient::spawn(&config, options()).unwrap_err();
    assert_eq!(err.error_code(), "MCP_SPAWN");
    assert!(err.to_string().contains("/nonexistent/tether-test-server"));
}

#[tokio::test]
async fn test_server_crash_is_reported_promptly() -> anyhow::Result<()> {
    let config = server(
        r#"    *'"method":"tools/call"'*)
      echo "panic: assignment to entry in nil map" >&2
      exit 3 ;;"#,
    );
    let mut client = McpClient::spawn(&config, options())?;
    client.handshake().await?;

    let started = Instant::now();
    let err = client
        .call_tool("advanced_list", json!({}), None)
        .await
        .unwrap_err();

    match &err {
        McpError::ProcessTerminated {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, Some(3));
            assert!(stderr.contains("nil map"), "stderr was {stderr:?}");
        }
        other => panic!("expected ProcessTerminated, got {other:?}"),
    }
    // nowhere near the 10s request timeout
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn test_silent_server_times_out_near_deadline() -> anyhow::Result<()> {
    let config = server(
        r#"    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":' ;;"#,
    );
    let mut client = McpClient::spawn(&config, options())?;
    client.handshake().await?;

    let started = Instant::now();
    let err = client
        .call_tool("advanced_list", json!({}), Some(Duration::from_millis(300)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        McpError::Timeout {
            method,
            partial_output,
            ..
        } => {
            assert_eq!(method, "tools/call");
            assert_eq!(partial_output.as_deref(), Some(r#"{"jsonrpc":"2.0","id":"#));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_closed_stdout_on_live_server_is_not_a_timeout() -> anyhow::Result<()> {
    let config =
        ServerConfig::new("sh").with_args(["-c", "echo closing >&2; exec >&-; sleep 3"]);
    let options = options().with_shutdown_grace(Duration::from_millis(200));
    let mut client = McpClient::spawn(&config, options)?;

    let started = Instant::now();
    let err = client.send_request("ping", None, None).await.unwrap_err();

    assert_eq!(err.error_code(), "MCP_STREAM_CLOSED", "got {err:?}");
    assert_eq!(err.stderr(), Some("closing\n"));
    // well inside the 10s request timeout
    assert!(started.elapsed() < Duration::from_secs(3));

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_kills_server_that_ignores_eof() -> anyhow::Result<()> {
    let config = ServerConfig::new("sh").with_args(["-c", "exec sleep 30"]);
    let options = options().with_shutdown_grace(Duration::from_millis(200));
    let mut client = McpClient::spawn(&config, options)?;

    let started = Instant::now();
    let report = client.close().await?;

    assert!(report.forced);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!client.is_connected());
    Ok(())
}
