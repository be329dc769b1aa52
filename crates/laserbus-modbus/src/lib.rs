// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # laserbus-modbus
//!
//! Modbus TCP client engine for the laser subsystem controller.
//!
//! This crate provides:
//!
//! - **Connection manager**: one Modbus TCP connection with edge events
//! - **Single-flight dispatcher**: a keyed request queue drained one request
//!   at a time on a 100 ms tick, with a per-request timeout
//! - **Event bus**: connection changes, errors and raw completions broadcast
//!   to any number of subscribers
//! - **Reconnect policy**: a caller-owned, bounded retry loop with backoff
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         EngineHandle                            │
//! │            (connect / queue reads and writes / subscribe)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │ commands
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Engine run loop                             │
//! │   ConnectionManager      Dispatcher (RequestQueue + InFlight)   │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌─────────────────────┐             ┌─────────────────────┐
//! │  RegisterTransport  │             │      EventBus       │
//! │ (TcpTransport impl) │             │     (broadcast)     │
//! └─────────────────────┘             └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use laserbus_core::{Block, DecodePipeline};
//! use laserbus_modbus::{Engine, EngineConfig, EngineEvent, TcpTransport};
//!
//! let (handle, _task) = Engine::spawn(Arc::new(TcpTransport::new()), EngineConfig::default());
//! let mut events = handle.subscribe();
//!
//! handle.connect("192.168.1.50", 502)?;
//! handle.read_block(Block::Sensors)?;
//!
//! let pipeline = DecodePipeline::standard();
//! while let Ok(event) = events.recv().await {
//!     if let EngineEvent::ReadCompleted(block) = event {
//!         for reading in pipeline.decode(&block).readings {
//!             println!("{reading}");
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{
    ExponentialBackoff, ReconnectPolicy, RegisterTransport, RetryResult, TcpTransport,
};
pub use connection::{ConnectionManager, Transition};
pub use dispatcher::{Abandoned, Dispatcher, InFlight, RequestQueue, Step};
pub use engine::{Engine, EngineConfig, EngineHandle};
pub use error::{ErrorKind, ErrorSeverity, ModbusError, ModbusResult, ProtocolError};
pub use events::{BusError, BusStats, EngineEvent, EventBus, EventSubscriber, Fault};
pub use types::{
    Completion, ConnectionConfig, ConnectionState, QueuedRequest, RequestSpec,
    DEFAULT_EVENT_CAPACITY, DEFAULT_PORT, DEFAULT_TICK_INTERVAL, DEFAULT_TIMEOUT,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
