// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # laserbus-bin
//!
//! CLI binary for the laserbus Modbus client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! │                    (Entry Point)                            │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ session  │ │ logging  │
//!        └──────────┘ └──────────┘ └──────────┘
//!               │           │
//!        ┌──────┴───────────┴──┐
//!        │     laserbus-*      │
//!        │      (crates)       │
//!        └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll every configured block until Ctrl+C
//! laserbus -c laserbus.yaml poll
//!
//! # Read the sensor block once, as JSON
//! laserbus -H 192.168.1.50 read 0x100 -n 17 -f json
//!
//! # Switch to work mode
//! laserbus -H 192.168.1.50 mode work
//!
//! # Decode a capture offline
//! laserbus decode 0x11E "0004 0000"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use session::Session;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
