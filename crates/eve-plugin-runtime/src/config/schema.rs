//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use eve_plugin_transport::{DEFAULT_MAX_RECEIVE_MESSAGE_SIZE, TransportSettings};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginConfig {
    /// Plugin identity and mode.
    #[serde(default)]
    pub plugin: PluginSection,

    /// How to reach the host's HTTP API.
    #[serde(default)]
    pub host: HostConfig,

    /// Local RPC listener settings.
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Plugin
// =============================================================================

/// Plugin identity.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PluginSection {
    /// Plugin id (the manifest's `plugin_alias`).
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub version: String,

    /// Run in debug/attach mode instead of being launched by the host.
    #[serde(default)]
    pub debug: bool,
}

// =============================================================================
// Host
// =============================================================================

/// Host HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Host address, without scheme.
    #[serde(default = "default_host_address")]
    pub address: String,

    /// Port of the host's internal API.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Timeout for host API requests in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: default_host_address(),
            rpc_port: default_rpc_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HostConfig {
    /// Base URL of the host API, e.g. `http://127.0.0.1:8091`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.rpc_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_host_address() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    8091
}

fn default_request_timeout_secs() -> u64 {
    300
}

// =============================================================================
// Transport
// =============================================================================

/// Local RPC listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Address to bind. Port 0 picks a free port.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Largest accepted message in bytes.
    #[serde(default = "default_max_receive_message_size")]
    pub max_receive_message_size: usize,

    /// Largest sent message in bytes. Unlimited when absent.
    #[serde(default)]
    pub max_send_message_size: Option<usize>,

    /// Time a new connection has to negotiate, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_receive_message_size: default_max_receive_message_size(),
            max_send_message_size: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl TransportConfig {
    /// Parses [`Self::bind_address`].
    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid_address(&self.bind_address, e.to_string())
            })
    }

    /// Converts to transport settings.
    pub fn to_settings(&self) -> TransportSettings {
        TransportSettings {
            max_receive_message_size: self.max_receive_message_size,
            max_send_message_size: self.max_send_message_size,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            ..Default::default()
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:0".to_string()
}

fn default_max_receive_message_size() -> usize {
    DEFAULT_MAX_RECEIVE_MESSAGE_SIZE
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    /// Destination. Defaults to stderr; stdout carries the announce line.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// When the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Rolled files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module level overrides, e.g. `eve_plugin_transport = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: BTreeMap::new(),
        }
    }
}

fn default_max_files() -> usize {
    5
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Output destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.host.rpc_port, 8091);
        assert_eq!(config.host.base_url(), "http://127.0.0.1:8091");
        assert_eq!(config.host.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert!(!config.plugin.debug);

        let settings = config.transport.to_settings();
        assert_eq!(settings.max_receive_message_size, 16 * 1024 * 1024);
        assert_eq!(settings.max_send_message_size, None);
        assert_eq!(settings.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bind_addr() {
        let mut transport = TransportConfig::default();
        assert_eq!(transport.bind_addr().unwrap().ip().to_string(), "127.0.0.1");
        transport.bind_address = "localhost".to_string();
        assert!(matches!(
            transport.bind_addr(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: PluginConfig =
            serde_json::from_str(r#"{"host": {"rpc_port": 9000}, "logging": {"level": "debug"}}"#)
                .unwrap();
        assert_eq!(config.host.rpc_port, 9000);
        assert_eq!(config.host.address, "127.0.0.1");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.max_files, 5);
    }
}
