// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the client engine.
//!
//! Every failure the engine observes is reported as a [`ModbusError`] and
//! published on the event bus as a [`Fault`](crate::events::Fault). The
//! [`ErrorKind`] taxonomy is what consumers match on.
//!
//! # Error Kinds
//!
//! ```text
//! ErrorKind
//! ├── ConnectionUnavailable - the engine task has stopped
//! ├── HostNotConfigured     - connect() called with an empty host
//! ├── ConnectFailed         - TCP connect rejected or timed out
//! ├── Protocol              - device returned a Modbus exception
//! ├── ReplyAborted          - transport closed mid-request (drives disconnect)
//! ├── Timeout               - no reply within the per-request timeout
//! ├── Transport             - other transport or framing failure
//! ├── IncompleteDecodeData  - block shorter than a field's width
//! └── UnknownAddress        - no catalog field at an address
//! ```

use std::fmt;
use std::time::Duration;

use laserbus_core::{DecodeError, RegisterAddress};
use thiserror::Error;
use tracing::Level;

/// Result type alias for engine operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError
// =============================================================================

/// The main error type for the client engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModbusError {
    /// The engine task is no longer running.
    #[error("Connection unavailable: engine is not running")]
    ConnectionUnavailable,

    /// `connect` was called without a host.
    #[error("Host is not configured")]
    HostNotConfigured,

    /// The transport rejected the connection or did not connect in time.
    #[error("Connect to {host}:{port} failed: {reason}")]
    ConnectFailed {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Failure description.
        reason: String,
    },

    /// The device answered with a Modbus exception.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// The connection closed while a request was pending.
    #[error("Reply aborted during {operation}: {reason}")]
    ReplyAborted {
        /// Operation that was pending.
        operation: &'static str,
        /// Close reason.
        reason: String,
    },

    /// No reply arrived within the request timeout.
    #[error("Request timeout at {address} after {} ms", .duration.as_millis())]
    Timeout {
        /// Start address of the request.
        address: RegisterAddress,
        /// Configured timeout.
        duration: Duration,
    },

    /// Transport I/O or framing failure that did not close the connection.
    #[error("Transport error during {operation}: {message}")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// A reply could not be decoded.
    #[error("{0}")]
    Decode(#[from] DecodeError),
}

impl ModbusError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connect failure.
    pub fn connect_failed(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            host: host.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Creates an exception response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::new(function_code, exception_code))
    }

    /// Creates a reply aborted error.
    pub fn reply_aborted(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::ReplyAborted {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates a request timeout.
    pub fn timeout(address: RegisterAddress, duration: Duration) -> Self {
        Self::Timeout { address, duration }
    }

    /// Creates a transport error.
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Error raised when an operation runs without an open connection.
    pub fn not_connected(operation: &'static str) -> Self {
        Self::reply_aborted(operation, "not connected")
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionUnavailable => ErrorKind::ConnectionUnavailable,
            Self::HostNotConfigured => ErrorKind::HostNotConfigured,
            Self::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::ReplyAborted { .. } => ErrorKind::ReplyAborted,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Decode(DecodeError::UnknownAddress { .. }) => ErrorKind::UnknownAddress,
            Self::Decode(_) => ErrorKind::IncompleteDecodeData,
        }
    }

    /// Returns `true` if the error means the connection is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ReplyAborted { .. })
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. }
            | Self::ReplyAborted { .. }
            | Self::Timeout { .. }
            | Self::Transport { .. } => true,
            Self::Protocol(e) => e.is_retryable(),
            Self::ConnectionUnavailable | Self::HostNotConfigured | Self::Decode(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Decode(DecodeError::UnknownAddress { .. }) => ErrorSeverity::Info,
            Self::Timeout { .. } | Self::Protocol(_) | Self::Decode(_) => ErrorSeverity::Warning,
            Self::ConnectFailed { .. } | Self::ReplyAborted { .. } | Self::Transport { .. } => {
                ErrorSeverity::Error
            }
            Self::ConnectionUnavailable | Self::HostNotConfigured => ErrorSeverity::Critical,
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let kind = self.kind();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                kind = %kind,
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                kind = %kind,
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                kind = %kind,
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ErrorKind
// =============================================================================

/// Error taxonomy carried on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine task has stopped.
    ConnectionUnavailable,
    /// No host was given to `connect`.
    HostNotConfigured,
    /// TCP connect failed or timed out.
    ConnectFailed,
    /// Modbus exception response.
    Protocol,
    /// Transport closed mid-request.
    ReplyAborted,
    /// Per-request timeout expired.
    Timeout,
    /// Other transport failure.
    Transport,
    /// Block shorter than a field's width.
    IncompleteDecodeData,
    /// No catalog field at an address.
    UnknownAddress,
}

impl ErrorKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable => "connection_unavailable",
            Self::HostNotConfigured => "host_not_configured",
            Self::ConnectFailed => "connect_failed",
            Self::Protocol => "protocol_error",
            Self::ReplyAborted => "reply_aborted",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::IncompleteDecodeData => "incomplete_decode_data",
            Self::UnknownAddress => "unknown_address",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Modbus exception response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Modbus exception: function code {function_code:#04x}, exception {exception_code} ({exception_name})")]
pub struct ProtocolError {
    /// Function code of the failed request.
    pub function_code: u8,
    /// Exception code returned by the device.
    pub exception_code: u8,
    /// Human-readable exception name.
    pub exception_name: &'static str,
}

impl ProtocolError {
    /// Creates an exception response error.
    pub fn new(function_code: u8, exception_code: u8) -> Self {
        Self {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code),
        }
    }

    /// Returns the human-readable name for an exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }

    /// Busy, acknowledge and gateway exceptions are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self.exception_code, 0x05 | 0x06 | 0x0A | 0x0B)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_names() {
        assert_eq!(ProtocolError::exception_name(0x01), "Illegal Function");
        assert_eq!(ProtocolError::exception_name(0x02), "Illegal Data Address");
        assert_eq!(ProtocolError::exception_name(0x42), "Unknown Exception");
    }

    #[test]
    fn test_exception_message() {
        let err = ModbusError::exception(0x03, 0x02);
        assert_eq!(
            err.to_string(),
            "Modbus exception: function code 0x03, exception 2 (Illegal Data Address)"
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!err.is_retryable());
        assert!(ModbusError::exception(0x03, 0x06).is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        let err = ModbusError::timeout(RegisterAddress::new(0x11E), Duration::from_millis(1000));
        assert_eq!(err.to_string(), "Request timeout at 0x11E after 1000 ms");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_connection_lost() {
        assert!(ModbusError::reply_aborted("read", "connection reset").is_connection_lost());
        assert!(ModbusError::not_connected("write").is_connection_lost());
        assert!(!ModbusError::transport("read", "bad frame").is_connection_lost());
        assert!(!ModbusError::exception(0x06, 0x04).is_connection_lost());
    }

    #[test]
    fn test_decode_kinds() {
        let incomplete: ModbusError =
            DecodeError::incomplete(RegisterAddress::new(0x200), "x", 2, 1).into();
        assert_eq!(incomplete.kind(), ErrorKind::IncompleteDecodeData);

        let unknown: ModbusError = DecodeError::unknown_address(RegisterAddress::new(0x1)).into();
        assert_eq!(unknown.kind(), ErrorKind::UnknownAddress);
        assert_eq!(unknown.tracing_level(), Level::INFO);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ModbusError::HostNotConfigured.severity(), ErrorSeverity::Critical);
        assert_eq!(
            ModbusError::connect_failed("10.0.0.1", 502, "refused").tracing_level(),
            Level::ERROR
        );
        assert_eq!(ErrorKind::ReplyAborted.to_string(), "reply_aborted");
    }
}
