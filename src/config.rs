//! Configuration using Figment.
//!
//! Configuration is layered, later sources winning:
//! 1. Built-in defaults
//! 2. `gaze_bridge.toml` (explicit path or found by [`find_config_file`])
//! 3. Environment variables prefixed with `GAZE_BRIDGE_`, sections split
//!    by a double underscore
//!
//! Example: `GAZE_BRIDGE_STREAM__NAME=Lab1` overrides `[stream] name`.
//!
//! ```no_run
//! use gaze_bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::load(None)?;
//! println!("Stream base name: {}", config.stream.name);
//! # Ok::<(), gaze_bridge::config::ConfigError>(())
//! ```

use crate::acquisition::AcquisitionSettings;
use crate::connection::ConnectionManager;
use crate::logging::{parse_log_level, OutputFormat};
use crate::run::RunSettings;
use crate::translate::InvalidGazePolicy;
use bridge_core::{DeviceEndpoint, RetryPolicy};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// File name searched for in the default locations.
pub const CONFIG_FILE_NAME: &str = "gaze_bridge.toml";
/// Prefix of overriding environment variables.
pub const ENV_PREFIX: &str = "GAZE_BRIDGE_";

/// Errors from loading, validating or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or extracted
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration could not be rendered as TOML
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file could not be written
    #[error("failed to write configuration to '{path}': {source}")]
    Write {
        /// Destination file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Outbound stream naming and payload
    pub stream: StreamConfig,
    /// Device selection
    pub device: DeviceConfig,
    /// Connect and reconnect retry budget
    pub connection: ConnectionConfig,
    /// Acquisition loop timing
    pub acquisition: AcquisitionConfig,
    /// Log level and output format
    pub logging: LoggingSection,
}

/// Outbound stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Base name; streams are published as `{name}_gaze` etc.
    pub name: String,
    /// What to publish for gaze points without a valid position
    pub invalid_gaze: InvalidGazePolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: "TobiiStreamEngine".to_string(),
            invalid_gaze: InvalidGazePolicy::Placeholder,
        }
    }
}

/// Device selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Endpoint URL; empty selects the first enumerated device
    pub endpoint: String,
}

/// Connect/reconnect retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay between attempts in milliseconds
    pub interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.max_attempts,
            interval_ms: policy.interval.as_millis() as u64,
        }
    }
}

/// Acquisition loop timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Upper bound on one wait for device data
    pub wait_timeout_ms: u64,
    /// Seconds of device clock between clock resynchronizations
    pub timesync_interval_s: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 100,
            timesync_interval_s: 30,
        }
    }
}

/// Logging level and format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Log line format
    pub format: OutputFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Compact,
        }
    }
}

impl BridgeConfig {
    /// Load from the first config file found (see [`find_config_file`]),
    /// then apply environment overrides. No file at all is fine.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = find_config_file(explicit);
        Self::load_from(path.as_deref())
    }

    /// Load from `path` (if any) plus environment overrides, then validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        let config: BridgeConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the recorder cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.name.trim().is_empty() {
            return Err(ConfigError::Invalid("stream.name must not be empty".to_string()));
        }
        if self.connection.attempts == 0 {
            return Err(ConfigError::Invalid(
                "connection.attempts must be at least 1".to_string(),
            ));
        }
        if self.acquisition.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "acquisition.wait_timeout_ms must be positive".to_string(),
            ));
        }
        parse_log_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }

    /// Retry budget for connect and reconnect.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connection.attempts,
            Duration::from_millis(self.connection.interval_ms),
        )
    }

    /// Acquisition loop settings.
    pub fn acquisition_settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            wait_timeout: Duration::from_millis(self.acquisition.wait_timeout_ms),
            timesync_interval: Duration::from_secs(self.acquisition.timesync_interval_s),
            invalid_gaze: self.stream.invalid_gaze,
        }
    }

    /// Everything a recording run needs.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            connection: ConnectionManager::new(self.retry_policy()),
            acquisition: self.acquisition_settings(),
        }
    }

    /// Configured device endpoint, empty for the first device found.
    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new(self.device.endpoint.clone())
    }
}

/// Locate a configuration file.
///
/// Order of preference: `explicit` if it exists, then
/// [`CONFIG_FILE_NAME`] in the working directory, the user configuration
/// directory and the executable's directory.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Config file not found, searching default locations");
    }

    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir);
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir);
    }

    let found = candidates
        .into_iter()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file());
    if found.is_none() {
        debug!("No config file found, using defaults");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.stream.name, "TobiiStreamEngine");
        assert_eq!(config.connection.attempts, 300);
        assert_eq!(config.connection.interval_ms, 100);
        assert_eq!(config.acquisition.wait_timeout_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = BridgeConfig::default();
        config.connection.attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BridgeConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.stream.name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.acquisition.wait_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = BridgeConfig::default();
        config.connection.attempts = 5;
        config.connection.interval_ms = 20;
        config.stream.invalid_gaze = InvalidGazePolicy::Drop;

        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(5, Duration::from_millis(20))
        );
        let settings = config.acquisition_settings();
        assert_eq!(settings.wait_timeout, Duration::from_millis(100));
        assert_eq!(settings.timesync_interval, Duration::from_secs(30));
        assert_eq!(settings.invalid_gaze, InvalidGazePolicy::Drop);
    }

    #[test]
    fn test_explicit_missing_file_falls_through() {
        let missing = Path::new("/definitely/not/here/gaze_bridge.toml");
        let found = find_config_file(Some(missing));
        assert_ne!(found.as_deref(), Some(missing));
    }
}
