// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the laserbus binary.

use laserbus_modbus::ErrorKind;
use thiserror::Error;

/// Result type alias for laserbus-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the laserbus binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The device could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The device answered with an error or not at all.
    #[error("Device error: {0}")]
    Device(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Input could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Config parsing error.
    #[error("Config error: {0}")]
    Config(#[from] laserbus_config::ConfigError),

    /// Engine error.
    #[error("Engine error: {0}")]
    Modbus(#[from] laserbus_modbus::ModbusError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a device error.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Connection(_) => 2,
            Self::Device(_) => 3,
            Self::Runtime(_) => 4,
            Self::Io(_) => 5,
            Self::Decode(_) => 6,
            Self::Modbus(err) if matches!(err.kind(), ErrorKind::HostNotConfigured) => 1,
            Self::Modbus(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectFailed | ErrorKind::ReplyAborted | ErrorKind::ConnectionUnavailable
                ) =>
            {
                2
            }
            Self::Modbus(_) => 3,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<laserbus_core::DecodeError> for BinError {
    fn from(err: laserbus_core::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("JSON output failed: {err}"))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with appropriate formatting.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
