// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract register transport.
//!
//! The engine drives any [`RegisterTransport`]. The production implementation
//! is [`TcpTransport`](super::tcp::TcpTransport); tests substitute scripted
//! mocks.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ModbusResult;

/// Half-duplex holding-register transport.
///
/// All methods take `&self` so the engine can share one transport between its
/// run loop and the task that performs the in-flight request. The engine never
/// issues two requests at once.
///
/// # Errors
///
/// Implementations report a closed connection as
/// [`ModbusError::ReplyAborted`](crate::error::ModbusError::ReplyAborted) and
/// device exceptions as
/// [`ModbusError::Protocol`](crate::error::ModbusError::Protocol). They do not
/// apply a per-request timeout; the engine owns the deadline.
///
/// # Cancellation
///
/// The engine drops a request future when its deadline passes or the
/// connection is torn down. A reply that arrives after that must never be
/// taken as the answer to a later request.
#[async_trait]
pub trait RegisterTransport: Send + Sync + 'static {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Opens the connection within `timeout`.
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> ModbusResult<()>;

    /// Closes the connection. Closing an idle transport is a no-op.
    async fn disconnect(&self) -> ModbusResult<()>;

    /// Returns `true` while the connection is open.
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Register Operations
    // =========================================================================

    /// Reads `count` holding registers (FC 0x03).
    async fn read_holding_registers(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>>;

    /// Writes one holding register (FC 0x06).
    async fn write_single_register(&self, unit_id: u8, address: u16, value: u16)
        -> ModbusResult<()>;

    /// Writes consecutive holding registers (FC 0x10).
    async fn write_multiple_registers(
        &self,
        unit_id: u8,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a name for logs.
    fn display_name(&self) -> String;
}
