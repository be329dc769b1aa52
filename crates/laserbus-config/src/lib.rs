// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # laserbus-config
//!
//! Configuration management for the laserbus client.
//!
//! ## Features
//!
//! - **Schema Definition**: connection, dispatcher, poll, reconnect and
//!   logging sections with field-addressed validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `LASERBUS_*` variables and `${VAR:default}`
//!   placeholders
//!
//! ## Quick Start
//!
//! ```no_run
//! use laserbus_config::loader::load_config;
//!
//! let config = load_config("laserbus.yaml").unwrap();
//! println!("Target: {}:{}", config.connection.host, config.connection.port);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! connection:
//!   host: ${LASER_HOST:192.168.1.50}
//!   port: 502
//!   timeout_ms: 1000
//!   unit_id: 1
//! poll:
//!   interval_secs: 5
//!   blocks: [mode_control, sensors, block_status]
//! reconnect:
//!   max_attempts: 5
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{
    ConnectionSection, DispatcherSection, LaserbusConfig, LogFormat, LogLevel, LoggingConfig,
    PollSection, ReconnectSection,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
