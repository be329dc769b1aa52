// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # laserbus Integration Tests
//!
//! Integration tests and shared test utilities for the laserbus workspace.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `mocks`: scripted [`RegisterTransport`](laserbus_modbus::RegisterTransport)
//!   - `fixtures`: register captures, configs and engine setup
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p laserbus-tests
//!
//! # Run specific test suite
//! cargo test -p laserbus-tests --test integration_dispatch
//! cargo test -p laserbus-tests --test integration_decode
//! cargo test -p laserbus-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Dispatch Tests (`integration_dispatch.rs`)
//! - Batch ordering and the single-flight invariant
//! - Timeout recovery on a paused clock
//! - Disconnect handling and stale completions
//!
//! ### Decode Tests (`integration_decode.rs`)
//! - Word order of composite values
//! - Status blocks and grouped bits
//! - Engine reads decoded end to end
//!
//! ### Config Tests (`integration_config.rs`)
//! - File formats, placeholders and environment overrides
//! - Validation errors
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use laserbus_tests::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let mock = MockTransport::new();
//!     let (handle, mut events, _task) = EngineFixtures::connected(&mock).await;
//!     handle.read_block(Block::Sensors).unwrap();
//!     let event = next_event(&mut events).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::device::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::init_test_logging;
    pub use crate::common::mocks::*;
}
