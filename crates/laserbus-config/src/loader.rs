// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for laserbus.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse YAML/TOML/JSON by file extension
//! 3. Apply `LASERBUS_*` environment overrides
//! 4. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! LASERBUS_HOST=192.168.1.50
//! LASERBUS_PORT=1502
//! LASERBUS_TIMEOUT_MS=500
//! LASERBUS_UNIT_ID=2
//! LASERBUS_POLL_INTERVAL_SECS=10
//! LASERBUS_LOG_LEVEL=debug
//! LASERBUS_LOG_FORMAT=json
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LaserbusConfig, LogFormat, LogLevel};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for laserbus.
///
/// # Examples
///
/// ```no_run
/// use laserbus_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("laserbus.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: "LASERBUS".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<LaserbusConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = self.read_file(path)?;
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config = self.parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(&mut config)?;

        debug!(
            host = %config.connection.host,
            port = config.connection.port,
            blocks = config.poll.blocks.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> ConfigResult<LaserbusConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config = self.parse_str(&content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise starts from defaults.
    ///
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(&self, path: Option<&Path>) -> ConfigResult<LaserbusConfig> {
        match path {
            Some(path) => self.load(path),
            None => {
                let mut config = LaserbusConfig::default();
                self.finish(&mut config)?;
                Ok(config)
            }
        }
    }

    fn finish(&self, config: &mut LaserbusConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    /// Reads file content.
    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Parses a string based on format.
    fn parse_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<LaserbusConfig> {
        match format {
            ConfigFormat::Yaml => yaml_parse(content),
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
        }
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unset variables without a default are left as written.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (env::var(var_name), default_value) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!(variable = var_name, "Environment variable not found");
                    result.push_str(&format!("${{{var_name}}}"));
                }
            }
        }

        result
    }

    fn env_key(&self, name: &str) -> String {
        format!("{}_{}", self.env_prefix, name)
    }

    fn env_parse<T: FromStr>(&self, name: &str, expected: &str) -> ConfigResult<Option<T>> {
        let key = self.env_key(name);
        match env::var(&key) {
            Ok(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::invalid_env_var(key, expected)),
            Err(_) => Ok(None),
        }
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut LaserbusConfig) -> ConfigResult<()> {
        if let Ok(value) = env::var(self.env_key("HOST")) {
            config.connection.host = value;
        }
        if let Some(port) = self.env_parse("PORT", "expected valid port number")? {
            config.connection.port = port;
        }
        if let Some(timeout) = self.env_parse("TIMEOUT_MS", "expected milliseconds")? {
            config.connection.timeout_ms = timeout;
        }
        if let Some(unit_id) = self.env_parse("UNIT_ID", "expected unit id 0-247")? {
            config.connection.unit_id = unit_id;
        }
        if let Some(interval) = self.env_parse("POLL_INTERVAL_SECS", "expected seconds")? {
            config.poll.interval_secs = interval;
        }
        if let Some(level) = self.env_parse::<LogLevel>("LOG_LEVEL", "expected log level")? {
            config.logging.level = level;
        }
        if let Some(format) = self.env_parse::<LogFormat>("LOG_FORMAT", "expected text, compact or json")? {
            config.logging.format = format;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// YAML parsing through the config crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// # Examples
///
/// ```no_run
/// use laserbus_config::loader::load_config;
///
/// let config = load_config("laserbus.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<LaserbusConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<LaserbusConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
