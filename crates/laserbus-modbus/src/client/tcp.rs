// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport implementation.
//!
//! Uses `tokio-modbus` for MBAP framing and PDU encoding. The codec performs
//! the big-endian wire-to-host swap of each register, so registers handed to
//! the engine are already in host order.
//!
//! # Abandoned exchanges
//!
//! The `tokio-modbus` context reads the next frame on the stream as the reply
//! to the request it just sent. When a request is dropped before its reply
//! arrives, or a reply does not match its request, the stream can no longer be
//! trusted: a late frame would be read as the answer to the next request. The
//! transport marks the exchange in doubt and reopens the socket to the same
//! peer before the next request. A failed reopen is reported as
//! [`ModbusError::ReplyAborted`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use laserbus_core::DEFAULT_UNIT_ID;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::Context as ModbusContext;
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, Exception};

use crate::error::{ModbusError, ModbusResult};
use crate::types::{FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_REGISTER};

use super::transport::RegisterTransport;

// =============================================================================
// TcpTransport
// =============================================================================

/// Modbus TCP transport using tokio-modbus.
///
/// One transport serves any number of connect/disconnect cycles; the target
/// is given on each `connect`.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use laserbus_modbus::client::{RegisterTransport, TcpTransport};
///
/// let transport = TcpTransport::new();
/// transport.connect("192.168.1.50", 502, Duration::from_secs(1)).await?;
/// let registers = transport.read_holding_registers(1, 0x100, 17).await?;
/// ```
pub struct TcpTransport {
    inner: Mutex<TcpTransportInner>,
    connected: AtomicBool,
}

#[derive(Debug, Clone)]
struct Target {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl Target {
    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct TcpTransportInner {
    context: Option<ModbusContext>,
    target: Option<Target>,
    /// Set while a request is on the wire. Still set afterwards if the
    /// request was dropped or its reply did not match.
    in_doubt: bool,
}

impl TcpTransportInner {
    fn new() -> Self {
        Self {
            context: None,
            target: None,
            in_doubt: false,
        }
    }
}

impl TcpTransport {
    /// Creates a disconnected transport.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TcpTransportInner::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Resolves `host:port`, trying a literal address before DNS.
    async fn resolve_address(host: &str, port: u16) -> ModbusResult<SocketAddr> {
        let addr_str = format!("{host}:{port}");

        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let resolved = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| {
                ModbusError::connect_failed(host, port, format!("failed to resolve host: {e}"))
            })?
            .next()
            .ok_or_else(|| ModbusError::connect_failed(host, port, "host resolved to no address"));
        resolved
    }

    /// Opens a socket to `target` and attaches a Modbus context to it.
    async fn open(target: &Target) -> ModbusResult<ModbusContext> {
        let Target {
            host,
            port,
            connect_timeout,
        } = target;

        let connect_future = async {
            let socket_addr = Self::resolve_address(host, *port).await?;
            let stream = TcpStream::connect(socket_addr)
                .await
                .map_err(|e| ModbusError::connect_failed(host.as_str(), *port, e.to_string()))?;

            stream.set_nodelay(true).ok();

            Ok::<_, ModbusError>(tcp::attach_slave(stream, Slave(DEFAULT_UNIT_ID)))
        };

        timeout(*connect_timeout, connect_future)
            .await
            .map_err(|_| {
                ModbusError::connect_failed(
                    host.as_str(),
                    *port,
                    format!("no connection within {} ms", connect_timeout.as_millis()),
                )
            })?
    }

    /// Reopens the socket if the previous exchange was abandoned.
    async fn resync(
        &self,
        inner: &mut TcpTransportInner,
        operation: &'static str,
    ) -> ModbusResult<()> {
        if !inner.in_doubt {
            return Ok(());
        }
        let Some(target) = inner.target.clone() else {
            inner.in_doubt = false;
            return Ok(());
        };

        tracing::debug!(peer = %target.peer(), "Reopening connection after abandoned exchange");
        inner.context = None;

        match Self::open(&target).await {
            Ok(ctx) => {
                inner.context = Some(ctx);
                inner.in_doubt = false;
                Ok(())
            }
            Err(error) => {
                inner.in_doubt = false;
                inner.target = None;
                self.connected.store(false, Ordering::Release);
                Err(ModbusError::reply_aborted(
                    operation,
                    format!("reconnect after abandoned exchange failed: {error}"),
                ))
            }
        }
    }

    /// Maps a tokio-modbus error to ModbusError.
    fn map_modbus_error(error: TokioModbusError, operation: &'static str) -> ModbusError {
        match error {
            TokioModbusError::Transport(io_error) => {
                use std::io::ErrorKind;
                match io_error.kind() {
                    ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::NotConnected => {
                        ModbusError::reply_aborted(operation, io_error.to_string())
                    }
                    _ => ModbusError::transport(operation, io_error.to_string()),
                }
            }
            TokioModbusError::Protocol(protocol_error) => {
                ModbusError::transport(operation, format!("{protocol_error:?}"))
            }
        }
    }

    /// Folds a tokio-modbus result into the engine's error model.
    fn finish<T>(
        &self,
        inner: &mut TcpTransportInner,
        function_code: u8,
        operation: &'static str,
        result: Result<Result<T, Exception>, TokioModbusError>,
    ) -> ModbusResult<T> {
        let error = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(exception)) => ModbusError::exception(function_code, u8::from(exception)),
            Err(TokioModbusError::Protocol(protocol_error)) => {
                // The frame belonged to another exchange.
                inner.in_doubt = true;
                Self::map_modbus_error(TokioModbusError::Protocol(protocol_error), operation)
            }
            Err(err) => Self::map_modbus_error(err, operation),
        };

        if error.is_connection_lost() {
            inner.context = None;
            inner.target = None;
            inner.in_doubt = false;
            self.connected.store(false, Ordering::Release);
        }
        Err(error)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegisterTransport for TcpTransport {
    async fn connect(&self, host: &str, port: u16, connect_timeout: Duration) -> ModbusResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let target = Target {
            host: host.to_string(),
            port,
            connect_timeout,
        };
        let ctx = Self::open(&target).await?;

        let mut inner = self.inner.lock().await;
        inner.context = Some(ctx);
        inner.target = Some(target);
        inner.in_doubt = false;
        drop(inner);

        self.connected.store(true, Ordering::Release);

        tracing::info!(host = %host, port, "Connected to Modbus TCP device");

        Ok(())
    }

    async fn disconnect(&self) -> ModbusResult<()> {
        self.connected.store(false, Ordering::Release);

        let mut inner = self.inner.lock().await;
        inner.in_doubt = false;
        let peer = inner.target.take().map(|t| t.peer());
        if let Some(mut ctx) = inner.context.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(error = %e, "Error disconnecting from Modbus device");
            }
            tracing::debug!(peer = ?peer, "Disconnected from Modbus TCP device");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_holding_registers(
        &self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        const OPERATION: &str = "read_holding_registers";

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.resync(inner, OPERATION).await?;
        let ctx = inner
            .context
            .as_mut()
            .ok_or_else(|| ModbusError::not_connected(OPERATION))?;

        ctx.set_slave(Slave(unit_id));
        inner.in_doubt = true;
        let result = ctx.read_holding_registers(address, count).await;
        inner.in_doubt = false;
        self.finish(inner, FC_READ_HOLDING_REGISTERS, OPERATION, result)
    }

    async fn write_single_register(
        &self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        const OPERATION: &str = "write_single_register";

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.resync(inner, OPERATION).await?;
        let ctx = inner
            .context
            .as_mut()
            .ok_or_else(|| ModbusError::not_connected(OPERATION))?;

        ctx.set_slave(Slave(unit_id));
        inner.in_doubt = true;
        let result = ctx.write_single_register(address, value).await;
        inner.in_doubt = false;
        self.finish(inner, FC_WRITE_SINGLE_REGISTER, OPERATION, result)
    }

    async fn write_multiple_registers(
        &self,
        unit_id: u8,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        const OPERATION: &str = "write_multiple_registers";

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.resync(inner, OPERATION).await?;
        let ctx = inner
            .context
            .as_mut()
            .ok_or_else(|| ModbusError::not_connected(OPERATION))?;

        ctx.set_slave(Slave(unit_id));
        inner.in_doubt = true;
        let result = ctx.write_multiple_registers(address, values).await;
        inner.in_doubt = false;
        self.finish(inner, FC_WRITE_MULTIPLE_REGISTERS, OPERATION, result)
    }

    fn display_name(&self) -> String {
        "Modbus TCP".to_string()
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Reads one MBAP request frame: header bytes and PDU.
    async fn read_frame(socket: &mut TcpStream) -> Option<([u8; 7], Vec<u8>)> {
        let mut header = [0u8; 7];
        socket.read_exact(&mut header).await.ok()?;
        let len = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut pdu = vec![0u8; len.checked_sub(1)?];
        socket.read_exact(&mut pdu).await.ok()?;
        Some((header, pdu))
    }

    /// Builds a reply frame echoing the request header.
    fn reply_frame(header: &[u8; 7], reply_pdu: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(7 + reply_pdu.len());
        frame.extend_from_slice(&header[0..4]);
        frame.extend_from_slice(&((reply_pdu.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(reply_pdu);
        frame
    }

    /// Serves one connection, answering each request with `respond(pdu)`.
    async fn serve_once<F>(listener: TcpListener, respond: F)
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let (mut socket, _) = listener.accept().await.unwrap();
        while let Some((header, pdu)) = read_frame(&mut socket).await {
            let frame = reply_frame(&header, &respond(&pdu));
            if socket.write_all(&frame).await.is_err() {
                return;
            }
        }
    }

    /// Serves every connection, answering FC 0x03 with each register holding
    /// the request's start address. The very first request is answered only
    /// after `first_delay`.
    async fn serve_address_echo(
        listener: TcpListener,
        first_delay: Duration,
        accepted: Arc<AtomicUsize>,
    ) {
        let delayed = Arc::new(AtomicBool::new(false));
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            let delayed = delayed.clone();

            tokio::spawn(async move {
                while let Some((header, pdu)) = read_frame(&mut socket).await {
                    let start = [pdu[1], pdu[2]];
                    let count = u16::from_be_bytes([pdu[3], pdu[4]]);
                    let mut reply = vec![0x03, (count * 2) as u8];
                    for _ in 0..count {
                        reply.extend_from_slice(&start);
                    }

                    if !delayed.swap(true, Ordering::SeqCst) {
                        tokio::time::sleep(first_delay).await;
                    }
                    if socket.write_all(&reply_frame(&header, &reply)).await.is_err() {
                        return;
                    }
                }
            });
        }
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = TcpTransport::default();
        assert!(!transport.is_connected());
        assert_eq!(transport.display_name(), "Modbus TCP");
    }

    #[test]
    fn test_io_error_mapping() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = TcpTransport::map_modbus_error(TokioModbusError::Transport(reset), "read");
        assert_eq!(err.kind(), ErrorKind::ReplyAborted);

        let other = std::io::Error::new(std::io::ErrorKind::InvalidData, "garbage");
        let err = TcpTransport::map_modbus_error(TokioModbusError::Transport(other), "read");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_operation_without_connection() {
        let transport = TcpTransport::new();
        let err = transport
            .read_holding_registers(1, 0x100, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyAborted);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new();
        let err = transport
            .connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_read_swaps_wire_bytes_to_host_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, |pdu| {
            assert_eq!(pdu, &[0x03, 0x01, 0x1E, 0x00, 0x02]);
            vec![0x03, 0x04, 0x00, 0x04, 0x12, 0x34]
        }));

        let transport = TcpTransport::new();
        transport
            .connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(transport.is_connected());

        let registers = transport
            .read_holding_registers(1, 0x11E, 2)
            .await
            .unwrap();
        assert_eq!(registers, vec![0x0004, 0x1234]);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_exception_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_once(listener, |pdu| vec![pdu[0] | 0x80, 0x02]));

        let transport = TcpTransport::new();
        transport
            .connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();

        let err = transport
            .write_single_register(1, 0x000, 4)
            .await
            .unwrap_err();
        assert_eq!(err, ModbusError::exception(0x06, 0x02));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_late_reply_never_answers_next_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        tokio::spawn(serve_address_echo(
            listener,
            Duration::from_millis(200),
            accepted.clone(),
        ));

        let transport = TcpTransport::new();
        transport
            .connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();

        // Dropped the way the engine drops a request past its deadline.
        let abandoned = timeout(
            Duration::from_millis(50),
            transport.read_holding_registers(1, 0x100, 1),
        )
        .await;
        assert!(abandoned.is_err());

        for address in [0x11E, 0x200, 0x500] {
            let registers = transport
                .read_holding_registers(1, address, 1)
                .await
                .unwrap();
            assert_eq!(registers, vec![address], "reply for {address:#X}");
        }

        // Let the late reply land on the abandoned socket.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let registers = transport.read_holding_registers(1, 0x502, 2).await.unwrap();
        assert_eq!(registers, vec![0x502, 0x502]);

        assert!(transport.is_connected());
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_clears_abandoned_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        tokio::spawn(serve_address_echo(
            listener,
            Duration::from_millis(200),
            accepted.clone(),
        ));

        let transport = TcpTransport::new();
        transport
            .connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let abandoned = timeout(
            Duration::from_millis(50),
            transport.read_holding_registers(1, 0x100, 1),
        )
        .await;
        assert!(abandoned.is_err());

        transport.disconnect().await.unwrap();
        let err = transport
            .read_holding_registers(1, 0x11E, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyAborted);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
