//! Integration tests for layered configuration loading and saving.

use gaze_bridge::config::{BridgeConfig, ConfigError};
use gaze_bridge::logging::OutputFormat;
use gaze_bridge::translate::InvalidGazePolicy;
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("gaze_bridge.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_save_then_load_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/dir/gaze_bridge.toml");

    let mut config = BridgeConfig::default();
    config.stream.name = "Lab1".to_string();
    config.stream.invalid_gaze = InvalidGazePolicy::Drop;
    config.device.endpoint = "tobii-ttp://IS404-100107417574".to_string();
    config.connection.attempts = 12;
    config.logging.format = OutputFormat::Json;
    config.save(&path).unwrap();

    let loaded = BridgeConfig::load_from(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[connection]
interval_ms = 250
"#,
    );

    let config = BridgeConfig::load_from(Some(&path)).unwrap();
    assert_eq!(config.stream.name, "TobiiStreamEngine");
    assert_eq!(
        config.retry_policy().interval,
        Duration::from_millis(250)
    );
    assert_eq!(config.retry_policy().max_attempts, 300);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[stream]
name = "FromFile"
"#,
    );

    std::env::set_var("GAZE_BRIDGE_STREAM__NAME", "FromEnv");
    std::env::set_var("GAZE_BRIDGE_ACQUISITION__WAIT_TIMEOUT_MS", "50");
    let result = BridgeConfig::load_from(Some(&path));
    std::env::remove_var("GAZE_BRIDGE_STREAM__NAME");
    std::env::remove_var("GAZE_BRIDGE_ACQUISITION__WAIT_TIMEOUT_MS");

    let config = result.unwrap();
    assert_eq!(config.stream.name, "FromEnv");
    assert_eq!(
        config.acquisition_settings().wait_timeout,
        Duration::from_millis(50)
    );
}

#[test]
#[serial]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[connection]
attempts = 0
"#,
    );
    assert!(matches!(
        BridgeConfig::load_from(Some(&path)),
        Err(ConfigError::Invalid(_))
    ));

    let path = write_config(&dir, "[logging]\nformat = \"fancy\"\n");
    assert!(matches!(
        BridgeConfig::load_from(Some(&path)),
        Err(ConfigError::Load(_))
    ));
}

#[test]
#[serial]
fn test_shipped_example_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gaze_bridge.toml");
    let config = BridgeConfig::load_from(Some(&path)).unwrap();
    assert_eq!(config, BridgeConfig::default());
}
