// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport layer and reconnect policy.
//!
//! - [`RegisterTransport`]: the half-duplex transport the engine drives
//! - [`TcpTransport`]: Modbus TCP over tokio-modbus
//! - [`ReconnectPolicy`]: caller-owned bounded reconnect loop

pub mod retry;
pub mod tcp;
pub mod transport;

pub use retry::{ExponentialBackoff, ReconnectPolicy, RetryResult};
pub use tcp::TcpTransport;
pub use transport::RegisterTransport;
