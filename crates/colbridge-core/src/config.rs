//! Configuration structures for colbridge.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.
//! Every section is optional; an empty file yields the defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Store connection and table names
    #[serde(default)]
    pub store: StoreConfig,

    /// Batch writer settings
    #[serde(default)]
    pub writer: WriterConfig,

    /// Scan settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Store connection configuration.
///
/// The adapter itself never connects anywhere; these values are handed to
/// whatever builds the [`crate::store::StoreConnector`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store instance name
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Coordination quorum (host[:port] entries)
    #[serde(default = "default_zookeepers")]
    pub zookeepers: Vec<String>,

    /// User to write as
    #[serde(default = "default_user")]
    pub user: String,

    /// Password for `user`
    pub password: Option<String>,

    /// Table holding the time series data
    #[serde(default = "default_data_table")]
    pub data_table: String,

    /// Table holding unique IDs
    #[serde(default = "default_uid_table")]
    pub uid_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            zookeepers: default_zookeepers(),
            user: default_user(),
            password: None,
            data_table: default_data_table(),
            uid_table: default_uid_table(),
        }
    }
}

/// Batch writer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WriterConfig {
    /// Bytes a writer buffers before sending on its own
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: usize,

    /// Maximum buffering delay in milliseconds
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Threads each writer may use to send
    #[serde(default = "default_write_threads")]
    pub write_threads: usize,
}

impl WriterConfig {
    /// Maximum buffering delay.
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_max_memory_bytes(),
            max_latency_ms: default_max_latency_ms(),
            write_threads: default_write_threads(),
        }
    }
}

/// Scan configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScanConfig {
    /// How scans are grouped into rows
    #[serde(default)]
    pub grouping: RowGrouping,

    /// Authorization labels scans run with
    #[serde(default)]
    pub authorizations: Vec<String>,
}

/// Strategy for turning a cell-ordered scan into whole rows.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowGrouping {
    /// Group client-side with one cell of lookahead
    #[default]
    Client,
    /// Ask the store to collapse each row into one encoded entry
    Server,
}

impl std::str::FromStr for RowGrouping {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(RowGrouping::Client),
            "server" => Ok(RowGrouping::Server),
            other => Err(crate::Error::Config(format!(
                "unknown row grouping '{}', expected 'client' or 'server'",
                other
            ))),
        }
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level (default)
    #[default]
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Plain text format (default)
    #[default]
    Text,
}

// Default value functions

fn default_instance() -> String {
    "accumulo".to_string()
}
fn default_zookeepers() -> Vec<String> {
    vec!["localhost".to_string()]
}
fn default_user() -> String {
    "root".to_string()
}
fn default_data_table() -> String {
    "tsdb".to_string()
}
fn default_uid_table() -> String {
    "tsdb-uid".to_string()
}
fn default_max_memory_bytes() -> usize {
    100_000
}
fn default_max_latency_ms() -> u64 {
    1000
}
fn default_write_threads() -> usize {
    4
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.store.instance.is_empty() {
            return Err(crate::Error::Config("Store instance name is required".into()));
        }

        if self.store.zookeepers.is_empty() {
            return Err(crate::Error::Config(
                "At least one zookeeper host required".into(),
            ));
        }

        if self.store.data_table.is_empty() || self.store.uid_table.is_empty() {
            return Err(crate::Error::Config(
                "Data and UID table names are required".into(),
            ));
        }

        if self.writer.max_memory_bytes == 0 {
            return Err(crate::Error::Config(
                "writer.max_memory_bytes must be greater than zero".into(),
            ));
        }

        if self.writer.max_latency_ms == 0 {
            return Err(crate::Error::Config(
                "writer.max_latency_ms must be greater than zero".into(),
            ));
        }

        if self.writer.write_threads == 0 {
            return Err(crate::Error::Config(
                "writer.write_threads must be greater than zero".into(),
            ));
        }

        if self.store.data_table == self.store.uid_table {
            tracing::warn!(
                table = %self.store.data_table,
                "Data and UID tables are the same table"
            );
        }

        Ok(())
    }
}
