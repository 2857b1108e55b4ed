//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level, so
//! `RUST_LOG=tether_core=trace` shows every line exchanged with the server.

use crate::config::LoggingConfig;
use crate::error::McpError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a global fmt subscriber.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init(config: &LoggingConfig) -> Result<(), McpError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| McpError::config(format!("Invalid log level '{}': {}", config.level, e)))?,
    };

    let span_events = if config.verbose {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_target(config.verbose)
        .with_writer(std::io::stderr);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        "pretty" => builder.pretty().try_init(),
        other => {
            return Err(McpError::config(format!(
                "Unknown log format '{}' (expected json, pretty or compact)",
                other
            )));
        }
    };

    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
    Ok(())
}
