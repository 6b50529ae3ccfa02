//! Configuration model for corral.
//!
//! This module defines the Config struct that represents `.corral/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of config values.

use crate::error::{CorralError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known config file path, relative to the working directory.
pub const CONFIG_PATH: &str = ".corral/config.yaml";

/// Well-known leader socket path, relative to the working directory.
///
/// Exactly one process per working directory binds this path; everyone else
/// talks to it as a client.
pub const DEFAULT_SOCKET_PATH: &str = ".corral/leader-sock";

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

/// Configuration for corral.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the leader socket. A `--socket` CLI flag overrides this.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Fixed sleep between retries in the acquire and do-once wait loops.
    ///
    /// There is no push notification from the leader, so observed latency of
    /// a state change is bounded by this interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a shutting-down leader waits for in-flight requests to drain.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            CorralError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from the well-known path, falling back to defaults when
    /// the file does not exist. A present-but-invalid file is an error.
    pub fn load_or_default() -> Result<Self> {
        let path = Path::new(CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward
    /// compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| CorralError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(CorralError::UserError(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(CorralError::UserError(
                "socket_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
