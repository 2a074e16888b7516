//! Client configuration

use crate::protocol::ClientInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Server location relative to the user's home directory.
pub const DEFAULT_SERVER_PATH: &str = ".local/bin/notebooklm-mcp";

pub const DEFAULT_TOOL_NAME: &str = "notebook_list";

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Logging level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Warn
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Configuration for one client session
#[derive(Debug, Clone)]
pub struct Config {
    pub server_path: PathBuf,
    pub args: Vec<String>,
    pub client_info: ClientInfo,
    pub tool_name: String,
    pub tool_arguments: Value,
    /// Upper bound on each wait for a response. `None` waits forever.
    pub response_timeout: Option<Duration>,
    /// Time the server gets to exit after SIGTERM before it is killed.
    pub shutdown_grace: Duration,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_path: default_server_path(),
            args: Vec::new(),
            client_info: ClientInfo::default(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            tool_arguments: Value::Object(Default::default()),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Default settings pointed at a different executable.
    pub fn with_server(server_path: impl Into<PathBuf>) -> Self {
        Self {
            server_path: server_path.into(),
            ..Self::default()
        }
    }
}

/// `~/.local/bin/notebooklm-mcp`, or the bare relative path without a home.
pub fn default_server_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DEFAULT_SERVER_PATH),
        _ => PathBuf::from(DEFAULT_SERVER_PATH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_call_notebook_list_with_empty_arguments() {
        let config = Config::default();

        assert_eq!(config.tool_name, "notebook_list");
        assert_eq!(config.tool_arguments, serde_json::json!({}));
        assert!(config.args.is_empty());
        assert_eq!(config.response_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        assert!(config.server_path.ends_with(".local/bin/notebooklm-mcp"));
    }

    #[test]
    fn with_server_keeps_other_defaults() {
        let config = Config::with_server("/opt/server");

        assert_eq!(config.server_path, PathBuf::from("/opt/server"));
        assert_eq!(config.client_info, ClientInfo::default());
    }

    #[test]
    fn log_level_maps_to_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(LogLevel::default()), tracing::Level::WARN);
    }
}
