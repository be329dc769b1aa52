// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine types: connection settings, connection state and queued requests.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use laserbus_modbus::types::{ConnectionConfig, RequestSpec};
//!
//! let config = ConnectionConfig::new("192.168.1.50")
//!     .with_port(1502)
//!     .with_timeout(Duration::from_millis(500));
//! assert_eq!(config.socket_addr(), "192.168.1.50:1502");
//!
//! assert_eq!(RequestSpec::Read { count: 2 }.function_code(), 0x03);
//! ```

use std::fmt;
use std::time::Duration;

use laserbus_core::{RawRegisterBlock, RegisterAddress, DEFAULT_UNIT_ID};

use crate::error::{ModbusError, ModbusResult};

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default connect and per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default dispatcher tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default event bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Function code: read holding registers.
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Function code: write single register.
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Function code: write multiple registers.
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

// =============================================================================
// ConnectionConfig
// =============================================================================

/// Target device and timing for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Connect timeout, also used as the per-request timeout.
    pub timeout: Duration,
    /// Default unit id for requests.
    pub unit_id: u8,
}

impl ConnectionConfig {
    /// Creates a configuration with default port, timeout and unit id.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            unit_id: DEFAULT_UNIT_ID,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the unit id.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Returns `host:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks the settings before connecting.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::HostNotConfigured);
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("")
    }
}

// =============================================================================
// ConnectionState
// =============================================================================

/// Connection state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Transport open.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// What to do at a queued address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSpec {
    /// Read `count` holding registers.
    Read {
        /// Number of registers.
        count: u16,
    },
    /// Write one holding register.
    WriteSingle {
        /// Register value.
        value: u16,
    },
    /// Write consecutive holding registers.
    WriteMultiple {
        /// Register values.
        values: Vec<u16>,
    },
}

impl RequestSpec {
    /// Returns the Modbus function code.
    pub const fn function_code(&self) -> u8 {
        match self {
            Self::Read { .. } => FC_READ_HOLDING_REGISTERS,
            Self::WriteSingle { .. } => FC_WRITE_SINGLE_REGISTER,
            Self::WriteMultiple { .. } => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }

    /// Returns the number of registers the request touches.
    pub fn register_count(&self) -> u16 {
        match self {
            Self::Read { count } => *count,
            Self::WriteSingle { .. } => 1,
            Self::WriteMultiple { values } => u16::try_from(values.len()).unwrap_or(u16::MAX),
        }
    }

    /// Returns the operation name for logs and errors.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read_holding_registers",
            Self::WriteSingle { .. } => "write_single_register",
            Self::WriteMultiple { .. } => "write_multiple_registers",
        }
    }

    /// Returns `true` for reads.
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

/// One entry of the address-keyed request queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    /// Start address and queue key.
    pub address: RegisterAddress,
    /// Operation and payload.
    pub spec: RequestSpec,
    /// Target unit id.
    pub unit_id: u8,
}

impl QueuedRequest {
    /// Creates a read request.
    pub fn read(address: RegisterAddress, count: u16, unit_id: u8) -> Self {
        Self {
            address,
            spec: RequestSpec::Read { count },
            unit_id,
        }
    }

    /// Creates a single register write.
    pub fn write_single(address: RegisterAddress, value: u16, unit_id: u8) -> Self {
        Self {
            address,
            spec: RequestSpec::WriteSingle { value },
            unit_id,
        }
    }

    /// Creates a multiple register write.
    pub fn write_multiple(address: RegisterAddress, values: Vec<u16>, unit_id: u8) -> Self {
        Self {
            address,
            spec: RequestSpec::WriteMultiple { values },
            unit_id,
        }
    }
}

impl fmt::Display for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} x{} (unit {})",
            self.spec.operation(),
            self.address,
            self.spec.register_count(),
            self.unit_id
        )
    }
}

/// Successful result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Registers read.
    Read(RawRegisterBlock),
    /// Registers written.
    Write {
        /// First register written.
        start: RegisterAddress,
        /// Number of registers written.
        count: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::new("10.0.0.5");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert_eq!(config.unit_id, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert_eq!(
            ConnectionConfig::new("  ").validate(),
            Err(ModbusError::HostNotConfigured)
        );
        assert!(ConnectionConfig::default().validate().is_err());
    }

    #[test]
    fn test_request_spec() {
        let read = RequestSpec::Read { count: 16 };
        assert_eq!(read.function_code(), 0x03);
        assert_eq!(read.register_count(), 16);
        assert!(read.is_read());

        let single = RequestSpec::WriteSingle { value: 4 };
        assert_eq!(single.function_code(), 0x06);
        assert_eq!(single.register_count(), 1);

        let multiple = RequestSpec::WriteMultiple {
            values: vec![0, 0x41CC],
        };
        assert_eq!(multiple.function_code(), 0x10);
        assert_eq!(multiple.register_count(), 2);
    }

    #[test]
    fn test_queued_request_display() {
        let request = QueuedRequest::read(RegisterAddress::new(0x100), 17, 1);
        assert_eq!(
            request.to_string(),
            "read_holding_registers @ 0x100 x17 (unit 1)"
        );
    }

    #[test]
    fn test_connection_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
