// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Loopback Device
//!
//! A minimal Modbus TCP server on `127.0.0.1` for tests that need the real
//! [`TcpTransport`](laserbus_modbus::TcpTransport) and real socket timing.
//! Run these tests on the normal clock: a paused clock auto-advances while
//! the runtime waits on socket I/O.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use laserbus_modbus::ConnectionConfig;

/// Modbus TCP server answering from register addresses.
///
/// Reads (FC 0x03) return `count` registers that each hold the request's
/// start address. Writes (FC 0x06, FC 0x10) are acknowledged. Other
/// function codes get an illegal function exception.
#[derive(Debug)]
pub struct LoopbackDevice {
    port: u16,
    accepted: Arc<AtomicUsize>,
    delays: Arc<Mutex<HashMap<u16, Duration>>>,
    task: JoinHandle<()>,
}

impl LoopbackDevice {
    /// Binds an ephemeral port and starts serving.
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let delays = Arc::new(Mutex::new(HashMap::new()));

        let task = tokio::spawn(accept_loop(listener, accepted.clone(), delays.clone()));

        Ok(Self {
            port,
            accepted,
            delays,
            task,
        })
    }

    /// Returns the listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection settings for this device with `timeout`.
    pub fn connection(&self, timeout: Duration) -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1")
            .with_port(self.port)
            .with_timeout(timeout)
    }

    /// Answers the next request at `address` only after `delay`.
    pub fn delay_once(&self, address: u16, delay: Duration) {
        self.delays.lock().insert(address, delay);
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for LoopbackDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    accepted: Arc<AtomicUsize>,
    delays: Arc<Mutex<HashMap<u16, Duration>>>,
) {
    while let Ok((socket, _)) = listener.accept().await {
        accepted.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(serve_connection(socket, delays.clone()));
    }
}

async fn serve_connection(mut socket: TcpStream, delays: Arc<Mutex<HashMap<u16, Duration>>>) {
    loop {
        let mut header = [0u8; 7];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = usize::from(u16::from_be_bytes([header[4], header[5]]));
        let Some(pdu_len) = len.checked_sub(1) else {
            return;
        };
        let mut pdu = vec![0u8; pdu_len];
        if pdu_len < 5 || socket.read_exact(&mut pdu).await.is_err() {
            return;
        }

        let address = u16::from_be_bytes([pdu[1], pdu[2]]);
        let reply = respond(&pdu);

        let delay = delays.lock().remove(&address);
        if let Some(delay) = delay {
            tracing::debug!(address, delay_ms = delay.as_millis() as u64, "Loopback device stalling");
            tokio::time::sleep(delay).await;
        }

        let mut frame = Vec::with_capacity(7 + reply.len());
        frame.extend_from_slice(&header[0..4]);
        frame.extend_from_slice(&((reply.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(&reply);
        if socket.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn respond(pdu: &[u8]) -> Vec<u8> {
    match pdu[0] {
        0x03 => {
            let start = [pdu[1], pdu[2]];
            let count = u16::from_be_bytes([pdu[3], pdu[4]]).min(125);
            let mut reply = vec![0x03, (count * 2) as u8];
            for _ in 0..count {
                reply.extend_from_slice(&start);
            }
            reply
        }
        0x06 | 0x10 => pdu[..5].to_vec(),
        function => vec![function | 0x80, 0x01],
    }
}
