// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for laserbus.
//!
//! # Schema Structure
//!
//! ```text
//! LaserbusConfig
//! ├── connection: ConnectionSection
//! ├── dispatcher: DispatcherSection
//! ├── poll: PollSection
//! ├── reconnect: ReconnectSection
//! └── logging: LoggingConfig
//! ```
//!
//! Every section is optional in the file and falls back to its defaults.

use std::str::FromStr;
use std::time::Duration;

use laserbus_core::Block;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default connect and per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Maximum timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Default unit id.
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Highest addressable Modbus unit id.
pub const MAX_UNIT_ID: u8 = 247;

/// Default dispatcher tick in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Maximum dispatcher tick in milliseconds.
pub const MAX_TICK_INTERVAL_MS: u64 = 10_000;

/// Default event bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Maximum poll interval in seconds (1 day).
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Default reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default maximum reconnect delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default reconnect jitter factor.
pub const DEFAULT_JITTER: f64 = 0.1;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for laserbus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaserbusConfig {
    /// Target device.
    pub connection: ConnectionSection,

    /// Engine tuning.
    pub dispatcher: DispatcherSection,

    /// Polling loop.
    pub poll: PollSection,

    /// Reconnect policy for caller-owned loops.
    pub reconnect: ReconnectSection,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl LaserbusConfig {
    /// Validates the entire configuration.
    ///
    /// An empty host is allowed here since the command line may supply one.
    pub fn validate(&self) -> ConfigResult<()> {
        self.connection.validate()?;
        self.dispatcher.validate()?;
        self.poll.validate()?;
        self.reconnect.validate()?;
        Ok(())
    }

    /// Returns the host, failing if none is configured.
    pub fn require_host(&self) -> ConfigResult<&str> {
        let host = self.connection.host.trim();
        if host.is_empty() {
            return Err(ConfigError::validation("connection.host", "cannot be empty"));
        }
        Ok(host)
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    /// Host name or IP address of the laser controller.
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Connect and per-request timeout.
    pub timeout_ms: u64,

    /// Modbus unit id.
    pub unit_id: u8,
}

impl ConnectionSection {
    /// Returns the timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the connection section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::validation("connection.port", "cannot be zero"));
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::out_of_range(
                "connection.timeout_ms",
                self.timeout_ms,
                1,
                MAX_TIMEOUT_MS,
            ));
        }
        if self.unit_id > MAX_UNIT_ID {
            return Err(ConfigError::out_of_range(
                "connection.unit_id",
                self.unit_id,
                0,
                MAX_UNIT_ID,
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            unit_id: DEFAULT_UNIT_ID,
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherSection {
    /// Dispatch tick.
    pub tick_interval_ms: u64,

    /// Event bus capacity per subscriber.
    pub event_capacity: usize,
}

impl DispatcherSection {
    /// Returns the tick as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the dispatcher section.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            return Err(ConfigError::out_of_range(
                "dispatcher.tick_interval_ms",
                self.tick_interval_ms,
                1,
                MAX_TICK_INTERVAL_MS,
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::validation(
                "dispatcher.event_capacity",
                "cannot be zero",
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// =============================================================================
// Poll
// =============================================================================

/// Polling loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    /// Seconds between poll rounds.
    pub interval_secs: u64,

    /// Register blocks read each round, by name.
    pub blocks: Vec<String>,
}

impl PollSection {
    /// Returns the interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Resolves the configured block names.
    pub fn blocks(&self) -> ConfigResult<Vec<Block>> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Block::from_str(name)
                    .map_err(|e| ConfigError::validation(format!("poll.blocks[{i}]"), e.to_string()))
            })
            .collect()
    }

    /// Validates the poll section.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&self.interval_secs) {
            return Err(ConfigError::out_of_range(
                "poll.interval_secs",
                self.interval_secs,
                1,
                MAX_POLL_INTERVAL_SECS,
            ));
        }
        if self.blocks.is_empty() {
            return Err(ConfigError::validation("poll.blocks", "cannot be empty"));
        }
        self.blocks().map(|_| ())
    }
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            blocks: Block::ALL.iter().map(|b| b.name().to_string()).collect(),
        }
    }
}

// =============================================================================
// Reconnect
// =============================================================================

/// Reconnect policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectSection {
    /// Attempts per reconnect cycle, `0` for unlimited.
    pub max_attempts: u32,

    /// First backoff delay.
    pub initial_delay_ms: u64,

    /// Backoff ceiling.
    pub max_delay_ms: u64,

    /// Jitter factor in `0.0..=1.0`.
    pub jitter: f64,
}

impl ReconnectSection {
    /// Returns the first delay as a duration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the delay ceiling as a duration.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validates the reconnect section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::validation(
                "reconnect.initial_delay_ms",
                "cannot be zero",
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::validation(
                "reconnect.max_delay_ms",
                "cannot be less than initial_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::out_of_range("reconnect.jitter", self.jitter, 0.0, 1.0));
        }
        Ok(())
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: DEFAULT_JITTER,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
