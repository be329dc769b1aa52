// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection manager.
//!
//! Owns the transport handle and the connection state. State changes are
//! published on a `watch` channel so `EngineHandle::is_connected` can answer
//! without a round trip; Connected/Disconnected edges are reported to the
//! caller as [`Transition`]s for the event bus.

use std::sync::Arc;

use tokio::sync::watch;

use crate::client::RegisterTransport;
use crate::error::ModbusResult;
use crate::types::{ConnectionConfig, ConnectionState};

/// Edge produced by a connection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Disconnected to Connected.
    Up,
    /// Connected to Disconnected.
    Down,
    /// No edge.
    Unchanged,
}

/// Connection lifecycle over a shared transport.
pub struct ConnectionManager {
    transport: Arc<dyn RegisterTransport>,
    config: Option<ConnectionConfig>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    pub fn new(transport: Arc<dyn RegisterTransport>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            config: None,
            state_tx,
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<dyn RegisterTransport> {
        &self.transport
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Returns `true` if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns the settings of the current or last connection.
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Subscribes to state changes.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Opens the connection.
    ///
    /// A no-op if already connected. Fails with `HostNotConfigured` for an
    /// empty host and `ConnectFailed` when the transport gives up.
    pub async fn connect(&mut self, config: ConnectionConfig) -> ModbusResult<Transition> {
        if self.is_connected() {
            tracing::debug!(host = %config.host, "Already connected, ignoring connect");
            return Ok(Transition::Unchanged);
        }

        config.validate()?;

        self.set_state(ConnectionState::Connecting);
        tracing::debug!(
            target_addr = %config.socket_addr(),
            timeout_ms = config.timeout.as_millis() as u64,
            "Connecting"
        );

        let result = self
            .transport
            .connect(&config.host, config.port, config.timeout)
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    transport = %self.transport.display_name(),
                    target_addr = %config.socket_addr(),
                    "Connection established"
                );
                self.config = Some(config);
                self.set_state(ConnectionState::Connected);
                Ok(Transition::Up)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Closes the connection. A no-op if already disconnected.
    pub async fn disconnect(&mut self) -> Transition {
        if self.state() == ConnectionState::Disconnected {
            return Transition::Unchanged;
        }

        self.set_state(ConnectionState::Disconnected);
        if let Err(e) = self.transport.disconnect().await {
            e.log("disconnect");
        }

        tracing::info!(
            target_addr = ?self.config.as_ref().map(ConnectionConfig::socket_addr),
            "Connection closed"
        );
        Transition::Down
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport.display_name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{ErrorKind, ModbusError};

    #[derive(Default)]
    struct StubTransport {
        refuse: AtomicBool,
        connected: AtomicBool,
        connects: AtomicU32,
    }

    #[async_trait]
    impl RegisterTransport for StubTransport {
        async fn connect(&self, host: &str, port: u16, _timeout: Duration) -> ModbusResult<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ModbusError::connect_failed(host, port, "refused"));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> ModbusResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn read_holding_registers(&self, _: u8, _: u16, count: u16) -> ModbusResult<Vec<u16>> {
            Ok(vec![0; usize::from(count)])
        }

        async fn write_single_register(&self, _: u8, _: u16, _: u16) -> ModbusResult<()> {
            Ok(())
        }

        async fn write_multiple_registers(&self, _: u8, _: u16, _: &[u16]) -> ModbusResult<()> {
            Ok(())
        }

        fn display_name(&self) -> String {
            "stub".to_string()
        }
    }

    #[tokio::test]
    async fn test_connect_edges() {
        let stub = Arc::new(StubTransport::default());
        let mut manager = ConnectionManager::new(stub.clone());
        let watch = manager.watch();

        let transition = manager
            .connect(ConnectionConfig::new("10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(transition, Transition::Up);
        assert_eq!(*watch.borrow(), ConnectionState::Connected);

        // Idempotent while connected.
        let again = manager
            .connect(ConnectionConfig::new("10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(again, Transition::Unchanged);
        assert_eq!(stub.connects.load(Ordering::SeqCst), 1);

        assert_eq!(manager.disconnect().await, Transition::Down);
        assert_eq!(manager.disconnect().await, Transition::Unchanged);
        assert!(!stub.is_connected());
        assert_eq!(manager.config().unwrap().host, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_connect_requires_host() {
        let stub = Arc::new(StubTransport::default());
        let mut manager = ConnectionManager::new(stub.clone());

        let err = manager.connect(ConnectionConfig::new("")).await.unwrap_err();
        assert_eq!(err, ModbusError::HostNotConfigured);
        assert_eq!(stub.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_disconnected() {
        let stub = Arc::new(StubTransport::default());
        stub.refuse.store(true, Ordering::SeqCst);
        let mut manager = ConnectionManager::new(stub);

        let err = manager
            .connect(ConnectionConfig::new("10.0.0.2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
