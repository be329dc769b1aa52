// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! [`MockTransport`] stands in for the TCP transport. Replies are scripted per
//! start address; anything unscripted answers immediately with registers
//! holding `address + offset`. Every request is recorded with the tokio
//! instant it reached the transport, so paused-clock tests can assert exact
//! timing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use laserbus_modbus::{ModbusError, ModbusResult, RegisterTransport};

// =============================================================================
// Scripted replies
// =============================================================================

/// How the mock answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer a read with these registers. Writes are acknowledged.
    Registers(Vec<u16>),
    /// Fail with this error.
    Fail(ModbusError),
    /// Never answer.
    Hang,
    /// Answer normally after `Duration`.
    Delay(Duration),
    /// Answer normally once the gate is opened.
    Gate(Arc<Notify>),
}

/// The request a call carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    /// FC 0x03.
    Read {
        /// Register count.
        count: u16,
    },
    /// FC 0x06.
    WriteSingle {
        /// Written value.
        value: u16,
    },
    /// FC 0x10.
    WriteMultiple {
        /// Written values.
        values: Vec<u16>,
    },
}

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    /// Request kind and payload.
    pub kind: CallKind,
    /// Unit id.
    pub unit_id: u8,
    /// Start address.
    pub address: u16,
    /// When the request reached the transport.
    pub at: Instant,
}

// =============================================================================
// MockTransport
// =============================================================================

/// A scripted register transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    connected: AtomicBool,
    connect_error: Mutex<Option<ModbusError>>,
    scripts: Mutex<HashMap<u16, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
    connects: AtomicU32,
    disconnects: AtomicU32,
    active: AtomicU32,
    max_active: AtomicU32,
}

impl MockTransport {
    /// Creates a mock behind an `Arc`, ready to hand to the engine.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues `reply` for the next request at `address`.
    ///
    /// Replies for one address are consumed in the order they were scripted.
    pub fn script(&self, address: u16, reply: Reply) {
        self.scripts
            .lock()
            .entry(address)
            .or_default()
            .push_back(reply);
    }

    /// Holds the next request at `address` until the returned gate is opened
    /// with `notify_one`.
    pub fn gate(&self, address: u16) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script(address, Reply::Gate(gate.clone()));
        gate
    }

    /// Makes every connect attempt fail with `error`, or succeed with `None`.
    pub fn fail_connect(&self, error: Option<ModbusError>) {
        *self.connect_error.lock() = error;
    }

    /// Returns every request recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Returns the start addresses of the recorded requests, in order.
    pub fn call_addresses(&self) -> Vec<u16> {
        self.calls.lock().iter().map(|c| c.address).collect()
    }

    /// Returns the number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Returns the number of disconnects.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Returns the highest number of requests that were pending at once.
    pub fn max_concurrent(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` requests have been recorded.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn serve(&self, kind: CallKind, unit_id: u8, address: u16) -> ModbusResult<Vec<u16>> {
        if !self.is_connected() {
            return Err(ModbusError::not_connected("request"));
        }

        let _active = ActiveGuard::enter(self);
        self.calls.lock().push(Call {
            kind: kind.clone(),
            unit_id,
            address,
            at: Instant::now(),
        });

        let reply = self
            .scripts
            .lock()
            .get_mut(&address)
            .and_then(VecDeque::pop_front);
        tracing::debug!(address, ?kind, scripted = reply.is_some(), "Mock request");

        match reply {
            None => {}
            Some(Reply::Registers(registers)) => return Ok(registers),
            Some(Reply::Fail(error)) => return Err(error),
            Some(Reply::Hang) => std::future::pending::<()>().await,
            Some(Reply::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Reply::Gate(gate)) => gate.notified().await,
        }

        Ok(default_registers(&kind, address))
    }
}

fn default_registers(kind: &CallKind, address: u16) -> Vec<u16> {
    match kind {
        CallKind::Read { count } => (0..*count).map(|i| address.wrapping_add(i)).collect(),
        CallKind::WriteSingle { .. } | CallKind::WriteMultiple { .. } => Vec::new(),
    }
}

/// Counts pending requests; dropping it also covers aborted requests.
struct ActiveGuard<'a>(&'a MockTransport);

impl<'a> ActiveGuard<'a> {
    fn enter(mock: &'a MockTransport) -> Self {
        let now = mock.active.fetch_add(1, Ordering::SeqCst) + 1;
        mock.max_active.fetch_max(now, Ordering::SeqCst);
        Self(mock)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegisterTransport for MockTransport {
    async fn connect(&self, host: &str, port: u16, _timeout: Duration) -> ModbusResult<()> {
        let error = self.connect_error.lock().clone();
        if let Some(error) = error {
            return Err(match error {
                ModbusError::ConnectFailed { reason, .. } => {
                    ModbusError::connect_failed(host, port, reason)
                }
                other => other,
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> ModbusResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_holding_registers(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.serve(CallKind::Read { count }, unit_id, address).await
    }

    async fn write_single_register(
        &self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        self.serve(CallKind::WriteSingle { value }, unit_id, address)
            .await
            .map(|_| ())
    }

    async fn write_multiple_registers(
        &self,
        unit_id: u8,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        let kind = CallKind::WriteMultiple {
            values: values.to_vec(),
        };
        self.serve(kind, unit_id, address).await.map(|_| ())
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_read_counts_up_from_address() {
        let mock = MockTransport::new();
        mock.connect("127.0.0.1", 502, Duration::from_secs(1))
            .await
            .unwrap();

        let registers = mock.read_holding_registers(1, 0x100, 3).await.unwrap();
        assert_eq!(registers, vec![0x100, 0x101, 0x102]);
        assert_eq!(mock.call_addresses(), vec![0x100]);
        assert_eq!(mock.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_scripted_replies_are_consumed_in_order() {
        let mock = MockTransport::new();
        mock.connect("127.0.0.1", 502, Duration::from_secs(1))
            .await
            .unwrap();
        mock.script(0x10, Reply::Registers(vec![7]));
        mock.script(0x10, Reply::Fail(ModbusError::exception(0x03, 0x02)));

        assert_eq!(mock.read_holding_registers(1, 0x10, 1).await.unwrap(), vec![7]);
        assert!(mock.read_holding_registers(1, 0x10, 1).await.is_err());
        assert_eq!(mock.read_holding_registers(1, 0x10, 1).await.unwrap(), vec![0x10]);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let mock = MockTransport::new();
        let err = mock.read_holding_registers(1, 0x10, 1).await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_names_target() {
        let mock = MockTransport::new();
        mock.fail_connect(Some(ModbusError::connect_failed("", 0, "refused")));

        let err = mock
            .connect("10.0.0.9", 1502, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, ModbusError::connect_failed("10.0.0.9", 1502, "refused"));
        assert!(!mock.is_connected());
    }
}
