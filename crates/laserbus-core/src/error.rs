// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the register catalog and decode pipeline.
//!
//! Decode failures are never fatal to the engine. They are collected per
//! block in a [`DecodeOutcome`](crate::decode::DecodeOutcome) so a single
//! truncated field does not hide the readings around it.
//!
//! ```text
//! DecodeError
//! ├── IncompleteData     - fewer registers than the field width
//! ├── UnknownAddress     - no catalog field at the address (skipped)
//! ├── InvalidWireLength  - raw capture with an odd byte count
//! └── InvalidCapture     - unparseable hex capture
//!
//! CatalogError
//! ├── Overlap / DuplicateName / BitOutOfRange - malformed catalogs
//! └── UnknownBlock / InvalidAddress            - lookup input errors
//! ```

use thiserror::Error;

use crate::types::RegisterAddress;

/// Result type alias for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// DecodeError
// =============================================================================

/// Errors produced while turning raw registers into typed readings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The block ends before the field's declared width.
    #[error(
        "Incomplete decode data for '{field}' at {address}: needs {expected} register(s), {available} available"
    )]
    IncompleteData {
        /// Start address of the field.
        address: RegisterAddress,
        /// Catalog name of the field.
        field: &'static str,
        /// Registers the field occupies.
        expected: u16,
        /// Registers left in the block.
        available: usize,
    },

    /// No catalog field starts at this address.
    #[error("Unknown register address {address}")]
    UnknownAddress {
        /// The unmapped address.
        address: RegisterAddress,
    },

    /// Raw wire capture cannot be split into 16-bit registers.
    #[error("Wire capture has odd length {len}; registers are two bytes each")]
    InvalidWireLength {
        /// Number of bytes in the capture.
        len: usize,
    },

    /// Hex capture text could not be parsed.
    #[error("Invalid hex capture: {message}")]
    InvalidCapture {
        /// Parser message.
        message: String,
    },
}

impl DecodeError {
    /// Creates an incomplete data error.
    pub fn incomplete(
        address: RegisterAddress,
        field: &'static str,
        expected: u16,
        available: usize,
    ) -> Self {
        Self::IncompleteData {
            address,
            field,
            expected,
            available,
        }
    }

    /// Creates an unknown address error.
    pub fn unknown_address(address: RegisterAddress) -> Self {
        Self::UnknownAddress { address }
    }

    /// Creates an invalid capture error.
    pub fn invalid_capture(message: impl Into<String>) -> Self {
        Self::InvalidCapture {
            message: message.into(),
        }
    }

    /// Returns the register address involved, if any.
    pub fn address(&self) -> Option<RegisterAddress> {
        match self {
            Self::IncompleteData { address, .. } | Self::UnknownAddress { address } => {
                Some(*address)
            }
            Self::InvalidWireLength { .. } | Self::InvalidCapture { .. } => None,
        }
    }

    /// Returns `true` for errors that are skipped without notification.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::UnknownAddress { .. })
    }

    /// Returns the error type name for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::IncompleteData { .. } => "incomplete_decode_data",
            Self::UnknownAddress { .. } => "unknown_address",
            Self::InvalidWireLength { .. } => "invalid_wire_length",
            Self::InvalidCapture { .. } => "invalid_capture",
        }
    }
}

// =============================================================================
// CatalogError
// =============================================================================

/// Errors raised when building or querying a register catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two fields share at least one register.
    #[error("Fields '{first}' and '{second}' overlap at {address}")]
    Overlap {
        /// Field that starts first.
        first: &'static str,
        /// Field that starts inside the first one.
        second: &'static str,
        /// Start address of the second field.
        address: RegisterAddress,
    },

    /// A field name is used twice.
    #[error("Duplicate field name '{name}'")]
    DuplicateName {
        /// The duplicated name.
        name: &'static str,
    },

    /// A bit definition does not fit into the field's registers.
    #[error("Bit '{bit}' of field '{field}' exceeds the field width")]
    BitOutOfRange {
        /// Owning field.
        field: &'static str,
        /// Offending bit definition.
        bit: &'static str,
    },

    /// Block name not recognised.
    #[error("Unknown register block '{name}'")]
    UnknownBlock {
        /// The name that was given.
        name: String,
    },

    /// Address text not recognised.
    #[error("Invalid register address '{input}'")]
    InvalidAddress {
        /// The text that was given.
        input: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_message() {
        let err = DecodeError::incomplete(RegisterAddress::new(0x200), "case_temperature_1_min", 2, 1);
        assert_eq!(
            err.to_string(),
            "Incomplete decode data for 'case_temperature_1_min' at 0x200: needs 2 register(s), 1 available"
        );
        assert_eq!(err.address(), Some(RegisterAddress::new(0x200)));
        assert!(!err.is_silent());
    }

    #[test]
    fn test_unknown_address_is_silent() {
        let err = DecodeError::unknown_address(RegisterAddress::new(0x1FF));
        assert!(err.is_silent());
        assert_eq!(err.error_type(), "unknown_address");
    }
}
