// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! - `test_load_*`: file formats and loading
//! - `test_env_*`: placeholders and environment overrides
//! - `test_validate_*`: validation rules
//!
//! Each test that touches the environment uses its own variable prefix.

use std::fs;
use std::time::Duration;

use laserbus_config::{
    load_config, ConfigError, ConfigFormat, ConfigLoader, LaserbusConfig, LogFormat, LogLevel,
};
use laserbus_core::Block;
use laserbus_tests::prelude::*;
use laserbus_tests::common::temp_test_dir;

fn loader(prefix: &str) -> ConfigLoader {
    ConfigLoader::new().with_env_prefix(prefix)
}

fn assert_fixture_values(config: &LaserbusConfig) {
    assert_eq!(config.connection.host, "192.168.10.20");
    assert_eq!(config.connection.port, 1502);
    assert_eq!(config.connection.timeout(), Duration::from_millis(750));
    assert_eq!(config.connection.unit_id, 3);
    assert_eq!(config.dispatcher.tick_interval(), Duration::from_millis(50));
    assert_eq!(config.dispatcher.event_capacity, 256);
    assert_eq!(config.poll.interval(), Duration::from_secs(2));
    assert_eq!(
        config.poll.blocks().unwrap(),
        vec![Block::Sensors, Block::BlockStatus]
    );
    assert_eq!(config.reconnect.max_attempts, 3);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_yaml_file() {
    let dir = temp_test_dir("laserbus-yaml");
    let path = dir.path().join("laserbus.yaml");
    fs::write(&path, ConfigFixtures::YAML).unwrap();

    let config = loader("LBT_LOAD_YAML").load(&path).unwrap();
    assert_fixture_values(&config);
}

#[test]
fn test_load_toml_file() {
    let dir = temp_test_dir("laserbus-toml");
    let path = dir.path().join("laserbus.toml");
    fs::write(&path, ConfigFixtures::TOML).unwrap();

    let config = loader("LBT_LOAD_TOML").load(&path).unwrap();
    assert_fixture_values(&config);
}

#[test]
fn test_load_json_keeps_defaults() {
    let config = loader("LBT_LOAD_JSON")
        .load_from_str(ConfigFixtures::JSON, ConfigFormat::Json)
        .unwrap();
    let defaults = LaserbusConfig::default();

    assert_eq!(config.connection.host, "10.1.1.1");
    assert_eq!(config.connection.port, defaults.connection.port);
    assert_eq!(config.dispatcher, defaults.dispatcher);
    assert_eq!(config.poll.blocks().unwrap(), vec![Block::GeneratorSetter]);
}

#[test]
fn test_load_missing_file() {
    let dir = temp_test_dir("laserbus-missing");
    let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_load_unsupported_extension() {
    let dir = temp_test_dir("laserbus-ext");
    let path = dir.path().join("laserbus.ini");
    fs::write(&path, "host=1").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_load_unknown_field_is_parse_error() {
    let dir = temp_test_dir("laserbus-unknown");
    let path = dir.path().join("laserbus.toml");
    fs::write(&path, "[connection]\nhostname = \"10.0.0.1\"\n").unwrap();

    let err = loader("LBT_LOAD_UNKNOWN").load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn test_load_or_default_without_path() {
    let config = loader("LBT_LOAD_DEFAULT").load_or_default(None).unwrap();
    assert_eq!(config, LaserbusConfig::default());
    assert!(config.require_host().is_err());
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_env_placeholders_resolved() {
    std::env::set_var("LBT_PLACEHOLDER_HOST", "10.9.8.7");
    let content = r#"
connection:
  host: ${LBT_PLACEHOLDER_HOST}
  port: ${LBT_PLACEHOLDER_PORT:1503}
"#;

    let config = loader("LBT_PLACEHOLDER")
        .load_from_str(content, ConfigFormat::Yaml)
        .unwrap();
    assert_eq!(config.connection.host, "10.9.8.7");
    assert_eq!(config.connection.port, 1503);
}

#[test]
fn test_env_overrides_file_values() {
    std::env::set_var("LBT_OVERRIDE_HOST", "172.16.0.5");
    std::env::set_var("LBT_OVERRIDE_TIMEOUT_MS", "2500");
    std::env::set_var("LBT_OVERRIDE_LOG_FORMAT", "compact");

    let config = loader("LBT_OVERRIDE")
        .load_from_str(ConfigFixtures::YAML, ConfigFormat::Yaml)
        .unwrap();
    assert_eq!(config.connection.host, "172.16.0.5");
    assert_eq!(config.connection.timeout_ms, 2500);
    assert_eq!(config.connection.port, 1502);
    assert_eq!(config.logging.format, LogFormat::Compact);
}

#[test]
fn test_env_invalid_override() {
    std::env::set_var("LBT_BADENV_PORT", "not-a-port");

    let err = loader("LBT_BADENV").load_or_default(None).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "LBT_BADENV_PORT"));
}

#[test]
fn test_env_overrides_can_be_disabled() {
    std::env::set_var("LBT_DISABLED_HOST", "172.16.0.9");

    let config = loader("LBT_DISABLED")
        .with_env_vars(false)
        .load_from_str(ConfigFixtures::YAML, ConfigFormat::Yaml)
        .unwrap();
    assert_eq!(config.connection.host, "192.168.10.20");
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validate_field_addressed_errors() {
    let cases = [
        ("[connection]\nport = 0\n", "connection.port"),
        ("[connection]\ntimeout_ms = 0\n", "connection.timeout_ms"),
        ("[connection]\nunit_id = 250\n", "connection.unit_id"),
        ("[dispatcher]\ntick_interval_ms = 0\n", "dispatcher.tick_interval_ms"),
        ("[poll]\ninterval_secs = 0\n", "poll.interval_secs"),
        ("[poll]\nblocks = [\"sensors\", \"alarms\"]\n", "poll.blocks[1]"),
        ("[reconnect]\njitter = 1.5\n", "reconnect.jitter"),
    ];

    for (content, field) in cases {
        let err = loader("LBT_VALIDATE")
            .load_from_str(content, ConfigFormat::Toml)
            .unwrap_err();
        assert_eq!(err.field(), Some(field), "{content}: {err}");
    }
}

#[test]
fn test_validate_backoff_bounds() {
    let content = "[reconnect]\ninitial_delay_ms = 5000\nmax_delay_ms = 1000\n";
    let err = loader("LBT_BACKOFF")
        .load_from_str(content, ConfigFormat::Toml)
        .unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn test_load_shipped_sample() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/laserbus.yaml");

    let config = loader("LBT_SAMPLE").load(&path).unwrap();
    let mut expected = LaserbusConfig::default();
    expected.connection.host = "192.168.1.50".to_string();
    assert_eq!(config, expected);
}
