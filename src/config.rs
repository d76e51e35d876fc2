//! # Configuration Management
//!
//! Centralized configuration for the daemon and its client.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! The defaults reproduce the classic deployment: a socket at `/tmp/odb.d`,
//! a backlog of 32, sixteen connection slots and a 500ms readiness bound.

use crate::error::{OdbError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Well-known IPC channel path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/odb.d";

/// Pending connections queued by the kernel before accept
pub const IPC_BACKLOG: u32 = 32;

/// Hard limit on concurrently serviced clients
pub const MAX_CONNECTIONS: usize = 16;

/// Replies queued for one client before it is considered stalled
pub const BACKPRESSURE_LIMIT: usize = 64;

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Name of the per-drum snapshot file written when persistence is enabled
pub const DEFAULT_SNAPSHOT_FILE: &str = "drum.odb";

/// Version reported by the shell's `v.` prefix
pub const CLIENT_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Top-level configuration for the daemon and the shell
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DaemonConfig {
    /// IPC channel and multiplexer settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Drum discovery and bucket limits
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| OdbError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| OdbError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| OdbError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `ODB_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("ODB_SOCKET_PATH") {
            self.server.socket_path = PathBuf::from(path);
        }

        if let Ok(root) = std::env::var("ODB_DRUM_ROOT") {
            self.storage.drum_root = PathBuf::from(root);
        }

        if let Ok(max) = std::env::var("ODB_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                self.server.max_connections = val;
            }
        }

        if let Ok(interval) = std::env::var("ODB_POLL_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                self.server.poll_interval = Duration::from_millis(val);
            }
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OdbError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| OdbError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(OdbError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// IPC channel and multiplexer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Filesystem path of the listening socket
    pub socket_path: PathBuf,

    /// Listen backlog
    pub backlog: u32,

    /// Number of connection slots; clients beyond this are refused
    pub max_connections: usize,

    /// Housekeeping tick; bounds how long the loop waits without waking
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Replies queued per connection before a non-reading client is dropped
    #[serde(default = "default_backpressure_limit")]
    pub backpressure_limit: usize,

    /// Maximum time spent writing one reply before the client is dropped
    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,

    /// Timeout for graceful shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

fn default_backpressure_limit() -> usize {
    BACKPRESSURE_LIMIT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            backlog: IPC_BACKLOG,
            max_connections: MAX_CONNECTIONS,
            backpressure_limit: BACKPRESSURE_LIMIT,
            poll_interval: timeout::POLL_INTERVAL,
            write_timeout: timeout::WRITE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.socket_path.as_os_str().is_empty() {
            errors.push("Socket path cannot be empty".to_string());
        } else if self.socket_path.as_os_str().len() >= 108 {
            // sun_path is 108 bytes including the terminator
            errors.push(format!(
                "Socket path too long: '{}' (maximum 107 bytes)",
                self.socket_path.display()
            ));
        }

        if self.backlog == 0 {
            errors.push("Backlog must be greater than 0".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 4096 {
            errors.push(format!(
                "Max connections very high: {} (maximum: 4096)",
                self.max_connections
            ));
        }

        if self.backpressure_limit == 0 {
            errors.push("Backpressure limit must be greater than 0".to_string());
        }

        if self.poll_interval.as_millis() < 10 {
            errors.push("Poll interval too short (minimum: 10ms)".to_string());
        } else if self.poll_interval.as_secs() > 60 {
            errors.push("Poll interval too long (maximum: 60s)".to_string());
        }

        if self.write_timeout.as_millis() < 10 {
            errors.push("Write timeout too short (minimum: 10ms)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Drum discovery and storage limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory whose immediate subdirectories become drums
    pub drum_root: PathBuf,

    /// Largest payload accepted in a packet
    pub max_payload_size: usize,

    /// Load drum snapshots at startup and write them back at shutdown
    #[serde(default)]
    pub persist: bool,

    /// Snapshot file name inside each drum directory
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
}

fn default_snapshot_file() -> String {
    DEFAULT_SNAPSHOT_FILE.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            drum_root: PathBuf::from("."),
            max_payload_size: MAX_PAYLOAD_SIZE,
            persist: false,
            snapshot_file: default_snapshot_file(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.drum_root.as_os_str().is_empty() {
            errors.push("Drum root cannot be empty".to_string());
        }

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 1024 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: 1 GB)",
                self.max_payload_size
            ));
        }

        if self.persist {
            if self.snapshot_file.is_empty() {
                errors.push("Snapshot file name cannot be empty".to_string());
            } else if self.snapshot_file.contains('/') {
                errors.push(format!(
                    "Snapshot file must be a bare file name: '{}'",
                    self.snapshot_file
                ));
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("odbd"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
