// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # laserbus-core
//!
//! Register catalog and decode pipeline for the laserbus Modbus client engine.
//!
//! This crate is free of I/O. It provides:
//!
//! - **Types**: `RegisterAddress`, `RawRegisterBlock`, `DecodedValue`, `Reading`,
//!   and the control values `Mode` and `SwitchState`
//! - **Catalog**: the static register map, partitioned into blocks
//! - **Decode**: pure functions from `(start, registers)` to typed readings
//! - **Error**: `DecodeError` and `CatalogError`
//!
//! ## Example
//!
//! ```rust
//! use laserbus_core::{DecodePipeline, RawRegisterBlock, RegisterAddress, DecodedValue};
//!
//! let block = RawRegisterBlock::from_wire_bytes(
//!     RegisterAddress::new(0x100),
//!     &[0x00, 0x04],
//! ).unwrap();
//!
//! let outcome = DecodePipeline::standard().decode(&block);
//! assert_eq!(outcome.readings[0].value, DecodedValue::UInt16(4));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod catalog;
pub mod decode;
pub mod error;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{
    BitDef, Block, ByteOrder, DecodeKind, FieldDef, ReadSpan, RegisterCatalog, CURRENT_PULSES_SWITCH,
    MODE_CONTROL_ADDRESS, THERMAL_STABILIZATION_SWITCH,
};
pub use decode::{
    combine_words, decode_float32, encode_float32, encode_float32_as, encode_u16, extract_bit,
    extract_group, split_words, DecodeOutcome, DecodePipeline,
};
pub use error::{CatalogError, CatalogResult, DecodeError, DecodeResult};
pub use types::{
    BitReading, DecodedValue, Mode, RawRegisterBlock, Reading, RegisterAddress, SwitchState,
    DEFAULT_UNIT_ID,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
