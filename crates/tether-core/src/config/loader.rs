//! Configuration loading and management

use super::TetherConfig;
use crate::error::McpError;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TETHER_";

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Configuration from a file (TOML if it ends in `.toml`, JSON otherwise)
    File(PathBuf),
    /// Configuration from process environment variables
    Environment,
    /// Configuration from an explicit variable map (same keys as the environment)
    Variables(HashMap<String, String>),
}

/// Configuration loader with support for multiple sources.
///
/// File sources are merged key by key in the order they were added, so a
/// later file only needs to mention what it changes. Variable sources are
/// applied on top of the merged files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    /// Add environment variables source
    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    /// Add an explicit variable map
    pub fn with_vars(self, vars: HashMap<String, String>) -> Self {
        self.add_source(ConfigSource::Variables(vars))
    }

    /// Load configuration from all sources
    pub fn load(self) -> Result<TetherConfig, McpError> {
        let mut merged = serde_json::to_value(TetherConfig::default())?;
        let mut overrides: Vec<HashMap<String, String>> = Vec::new();

        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    tracing::debug!("Loading config from file: {}", path.display());
                    if let Some(value) = load_file(&path)? {
                        merge_values(&mut merged, value);
                    }
                }
                ConfigSource::Environment => {
                    tracing::debug!("Loading config from environment");
                    overrides.push(
                        std::env::vars()
                            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
                            .collect(),
                    );
                }
                ConfigSource::Variables(vars) => overrides.push(vars),
            }
        }

        let mut config: TetherConfig = serde_json::from_value(merged)
            .map_err(|e| McpError::config(format!("Invalid configuration: {}", e)))?;

        for vars in &overrides {
            apply_overrides(&mut config, vars)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<Option<Value>, McpError> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, skipping", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        McpError::config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;

    let value = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str::<Value>(&content).map_err(|e| {
            McpError::config(format!("Failed to parse TOML config '{}': {}", path.display(), e))
        })?,
        _ => serde_json::from_str::<Value>(&content).map_err(|e| {
            McpError::config(format!("Failed to parse JSON config '{}': {}", path.display(), e))
        })?,
    };

    Ok(Some(value))
}

/// Deep-merge `other` into `base`; objects merge per key, everything else replaces
fn merge_values(base: &mut Value, other: Value) {
    match (base, other) {
        (Value::Object(base), Value::Object(other)) => {
            for (key, value) in other {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, other) => *base = other,
    }
}

fn apply_overrides(
    config: &mut TetherConfig,
    vars: &HashMap<String, String>,
) -> Result<(), McpError> {
    let var = |name: &str| vars.get(&format!("{}{}", ENV_PREFIX, name));

    if let Some(command) = var("SERVER_COMMAND") {
        config.server.command = command.clone();
    }
    if let Some(args) = var("SERVER_ARGS") {
        config.server.args = args.split_whitespace().map(str::to_string).collect();
    }
    if let Some(value) = var("REQUEST_TIMEOUT") {
        config.client.request_timeout = parse_duration("REQUEST_TIMEOUT", value)?;
    }
    if let Some(value) = var("POLL_INTERVAL") {
        config.client.poll_interval = parse_duration("POLL_INTERVAL", value)?;
    }
    if let Some(value) = var("SHUTDOWN_GRACE") {
        config.client.shutdown_grace = parse_duration("SHUTDOWN_GRACE", value)?;
    }
    if let Some(version) = var("PROTOCOL_VERSION") {
        config.client.protocol_version = version.clone();
    }
    if let Some(level) = var("LOG_LEVEL") {
        config.logging.level = level.clone();
    }
    if let Some(format) = var("LOG_FORMAT") {
        config.logging.format = format.clone();
    }

    Ok(())
}

fn parse_duration(name: &str, value: &str) -> Result<Duration, McpError> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| {
        McpError::config(format!("Invalid {}{} value '{}': {}", ENV_PREFIX, name, value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tether.toml",
            r#"
            [server]
            command = "go"
            args = ["run", "main.go", "serve", "--transport", "stdio"]

            [client]
            request_timeout = "10s"

            [logging]
            level = "debug"
            "#,
        );

        let config = ConfigLoader::new().with_file(&path).load().unwrap();
        assert_eq!(config.server.command, "go");
        assert_eq!(config.server.args.len(), 5);
        assert_eq!(config.client.request_timeout, Duration::from_secs(10));
        assert_eq!(config.client.poll_interval, Duration::from_millis(100));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_later_file_only_changes_what_it_mentions() {
        let dir = TempDir::new().unwrap();
        let base_json = serde_json::json!({
            "server": {"command": "node", "args": ["server.js"]},
            "client": {"poll_interval": "50ms"}
        });
        let base = write(&dir, "base.json", &base_json.to_string());
        let local = write(&dir, "local.json", r#"{"client": {"request_timeout": "2s"}}"#);

        let config = ConfigLoader::new()
            .with_file(&base)
            .with_file(&local)
            .load()
            .unwrap();

        assert_eq!(config.server.command, "node");
        assert_eq!(config.client.poll_interval, Duration::from_millis(50));
        assert_eq!(config.client.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let config = ConfigLoader::new()
            .with_file("/nonexistent/tether.toml")
            .with_vars(HashMap::from([(
                "TETHER_SERVER_COMMAND".to_string(),
                "cat".to_string(),
            )]))
            .load()
            .unwrap();
        assert_eq!(config.server.command, "cat");
    }

    #[test]
    fn test_variable_overrides() {
        let vars = HashMap::from([
            ("TETHER_SERVER_COMMAND".to_string(), "python3".to_string()),
            ("TETHER_SERVER_ARGS".to_string(), "-m server".to_string()),
            ("TETHER_REQUEST_TIMEOUT".to_string(), "1m".to_string()),
            ("TETHER_POLL_INTERVAL".to_string(), "20ms".to_string()),
            ("TETHER_LOG_LEVEL".to_string(), "trace".to_string()),
        ]);

        let config = ConfigLoader::new().with_vars(vars).load().unwrap();
        assert_eq!(config.server.display_command(), "python3 -m server");
        assert_eq!(config.client.request_timeout, Duration::from_secs(60));
        assert_eq!(config.client.poll_interval, Duration::from_millis(20));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_duration_override() {
        let vars = HashMap::from([
            ("TETHER_SERVER_COMMAND".to_string(), "cat".to_string()),
            ("TETHER_REQUEST_TIMEOUT".to_string(), "soon".to_string()),
        ]);
        let err = ConfigLoader::new().with_vars(vars).load().unwrap_err();
        assert_eq!(err.error_code(), "MCP_CONFIG");
        assert!(err.to_string().contains("TETHER_REQUEST_TIMEOUT"));
    }

    #[test]
    fn test_bad_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.toml", "[server\ncommand = ");
        let err = ConfigLoader::new().with_file(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_empty_command_fails_validation() {
        let err = ConfigLoader::new().load().unwrap_err();
        assert!(err.to_string().contains("command"));
    }
}
