// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Decode pipeline: raw register blocks to typed readings.
//!
//! The pipeline walks a [`RawRegisterBlock`] from its start address. At each
//! position it looks up the catalog field that starts there, converts each of
//! the field's words with its [`ByteOrder`] and applies the field's
//! [`DecodeKind`]. With `w(i)` the converted word `i`:
//!
//! | Kind          | Registers | Rule                                       |
//! |---------------|-----------|--------------------------------------------|
//! | `UInt16`      | 1         | `w(0)`                                     |
//! | `UInt32`      | 2         | `(w(1) << 16) \| w(0)`                     |
//! | `Float32`     | 2         | uint32 rule, then `f32::from_bits`         |
//! | `Bits`        | 1         | bit `N` is `(w(0) >> N) & 1`               |
//! | `StatusBlock` | 2         | uint32 rule, then bit extraction           |
//!
//! For [`ByteOrder::Swapped`] fields this is the per-word swap followed by
//! the low-word-first combine; for [`ByteOrder::AsDelivered`] fields the
//! words are combined as they come from the codec. A 2-bit group `{N, N+1}`
//! decodes as `(bit(N+1) << 1) | bit(N)`.
//!
//! Addresses without a field are skipped and listed in
//! [`DecodeOutcome::skipped`]. A field cut off by the end of the block yields
//! [`DecodeError::IncompleteData`] and no reading.
//!
//! # Example
//!
//! ```
//! use laserbus_core::decode::DecodePipeline;
//! use laserbus_core::types::{RawRegisterBlock, RegisterAddress};
//!
//! let block = RawRegisterBlock::new(RegisterAddress::new(0x100), vec![2, 1]);
//! let outcome = DecodePipeline::standard().decode(&block);
//! assert_eq!(outcome.readings.len(), 2);
//! assert_eq!(outcome.readings[0].name, "board_operating_mode");
//! ```

use serde::Serialize;

use crate::catalog::{BitDef, ByteOrder, DecodeKind, FieldDef, RegisterCatalog};
use crate::error::{DecodeError, DecodeResult};
use crate::types::{BitReading, DecodedValue, RawRegisterBlock, Reading, RegisterAddress};

// =============================================================================
// Word helpers
// =============================================================================

/// Combines two host-order registers, low word first.
#[inline]
pub const fn combine_words(low: u16, high: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

/// Splits a 32-bit value into `[low, high]` registers.
#[inline]
pub const fn split_words(value: u32) -> [u16; 2] {
    [(value & 0xFFFF) as u16, (value >> 16) as u16]
}

/// Decodes an IEEE-754 binary32 from two registers, low word first.
#[inline]
pub fn decode_float32(low: u16, high: u16) -> f32 {
    f32::from_bits(combine_words(low, high))
}

/// Encodes an IEEE-754 binary32 into `[low, high]` registers.
#[inline]
pub fn encode_float32(value: f32) -> [u16; 2] {
    split_words(value.to_bits())
}

/// Extracts bit `position` of `value`. Positions past 31 read as unset.
#[inline]
pub fn extract_bit(value: u32, position: u8) -> bool {
    value.checked_shr(u32::from(position)).unwrap_or(0) & 1 == 1
}

/// Extracts a `width`-bit group starting at `position`, lowest bit first.
pub fn extract_group(value: u32, position: u8, width: u8) -> u8 {
    (0..width).rev().fold(0u8, |acc, offset| {
        let bit = position
            .checked_add(offset)
            .map(|p| extract_bit(value, p))
            .unwrap_or(false);
        (acc << 1) | u8::from(bit)
    })
}

/// Decodes every bit definition against `value`.
pub fn decode_bits(value: u32, defs: &[BitDef]) -> Vec<BitReading> {
    defs.iter()
        .map(|def| BitReading {
            name: def.name,
            label: def.label,
            position: def.position,
            width: def.width,
            value: extract_group(value, def.position, def.width),
        })
        .collect()
}

/// Applies `field`'s byte order and decode kind to the registers starting at
/// the field.
///
/// `words` may be longer than the field; extra registers are ignored.
pub fn decode_field(field: &FieldDef, words: &[u16]) -> DecodeResult<DecodedValue> {
    let incomplete =
        || DecodeError::incomplete(field.address, field.name, field.width(), words.len());
    let w = |word: &u16| field.byte_order.apply(*word);

    let value = match (field.kind, words) {
        (DecodeKind::UInt16, [value, ..]) => DecodedValue::UInt16(w(value)),
        (DecodeKind::Bits(defs), [value, ..]) => {
            DecodedValue::BitField(decode_bits(u32::from(w(value)), defs))
        }
        (DecodeKind::UInt32, [low, high, ..]) => {
            DecodedValue::UInt32(combine_words(w(low), w(high)))
        }
        (DecodeKind::Float32, [low, high, ..]) => {
            DecodedValue::Float32(decode_float32(w(low), w(high)))
        }
        (DecodeKind::StatusBlock(defs), [low, high, ..]) => {
            DecodedValue::BitField(decode_bits(combine_words(w(low), w(high)), defs))
        }
        _ => return Err(incomplete()),
    };
    Ok(value)
}

/// Encodes a 16-bit value into the register word for `order`.
#[inline]
pub const fn encode_u16(value: u16, order: ByteOrder) -> u16 {
    order.apply(value)
}

/// Encodes an IEEE-754 binary32 into `[low, high]` register words for `order`.
pub fn encode_float32_as(value: f32, order: ByteOrder) -> [u16; 2] {
    encode_float32(value).map(|word| order.apply(word))
}

// =============================================================================
// DecodeOutcome
// =============================================================================

/// Result of decoding one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeOutcome {
    /// Decoded fields in address order.
    pub readings: Vec<Reading>,
    /// Fields that could not be decoded.
    #[serde(skip)]
    pub errors: Vec<DecodeError>,
    /// Addresses no field starts at.
    pub skipped: Vec<RegisterAddress>,
}

impl DecodeOutcome {
    /// Returns `true` if no field failed to decode.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Looks up a reading by field name.
    pub fn reading(&self, name: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.name == name)
    }
}

// =============================================================================
// DecodePipeline
// =============================================================================

/// Decodes register blocks against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct DecodePipeline<'c> {
    catalog: &'c RegisterCatalog,
}

impl DecodePipeline<'static> {
    /// Pipeline over the built-in catalog.
    pub fn standard() -> Self {
        Self::new(RegisterCatalog::standard())
    }
}

impl<'c> DecodePipeline<'c> {
    /// Creates a pipeline over `catalog`.
    pub fn new(catalog: &'c RegisterCatalog) -> Self {
        Self { catalog }
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &'c RegisterCatalog {
        self.catalog
    }

    /// Decodes every field that starts inside `block`.
    pub fn decode(&self, block: &RawRegisterBlock) -> DecodeOutcome {
        let mut outcome = DecodeOutcome::default();
        let registers = block.registers();
        let mut offset = 0usize;

        while offset < registers.len() {
            let Some(address) = u16::try_from(offset)
                .ok()
                .and_then(|o| block.start().offset(o))
            else {
                break;
            };

            let Some(field) = self.catalog.field(address) else {
                outcome.skipped.push(address);
                offset += 1;
                continue;
            };

            match decode_field(field, &registers[offset..]) {
                Ok(value) => {
                    outcome.readings.push(Reading {
                        address,
                        name: field.name,
                        label: field.label,
                        value,
                    });
                    offset += usize::from(field.width());
                }
                Err(err) => {
                    tracing::debug!(address = %address, field = field.name, error = %err, "Field truncated by block end");
                    outcome.errors.push(err);
                    break;
                }
            }
        }

        if !outcome.skipped.is_empty() {
            tracing::trace!(
                start = %block.start(),
                skipped = outcome.skipped.len(),
                "Skipped unmapped registers"
            );
        }

        outcome
    }

    /// Decodes the single field starting at `address`.
    pub fn decode_at(&self, address: RegisterAddress, words: &[u16]) -> DecodeResult<Reading> {
        let field = self
            .catalog
            .field(address)
            .ok_or(DecodeError::UnknownAddress { address })?;
        Ok(Reading {
            address,
            name: field.name,
            label: field.label,
            value: decode_field(field, words)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Block;

    fn addr(value: u16) -> RegisterAddress {
        RegisterAddress::new(value)
    }

    #[test]
    fn test_combine_words_low_first() {
        assert_eq!(combine_words(0x0004, 0x0000), 4);
        assert_eq!(combine_words(0x5678, 0x1234), 0x1234_5678);
        assert_eq!(split_words(0x1234_5678), [0x5678, 0x1234]);
    }

    #[test]
    fn test_float32_encoding() {
        for value in [0.0f32, -0.0, 1.0, 25.5, -273.15, f32::MAX, f32::MIN_POSITIVE] {
            let [low, high] = encode_float32(value);
            assert_eq!(decode_float32(low, high).to_bits(), value.to_bits());
        }
        // 25.5 = 0x41CC0000
        assert_eq!(encode_float32(25.5), [0x0000, 0x41CC]);
    }

    #[test]
    fn test_extract_bit() {
        assert!(extract_bit(0b110, 1));
        assert!(extract_bit(0b110, 2));
        assert!(!extract_bit(0b110, 0));
        assert!(!extract_bit(u32::MAX, 40));
    }

    #[test]
    fn test_extract_group() {
        let value = 1u32 << 25;
        assert_eq!(extract_group(value, 25, 2), 1);
        assert_eq!(extract_group(1u32 << 26, 25, 2), 2);
        assert_eq!(extract_group(0b11 << 25, 25, 2), 3);
        assert_eq!(extract_group(0, 25, 2), 0);
    }

    #[test]
    fn test_decode_uint32_field() {
        let field = FieldDef::new(0x10, Block::Sensors, DecodeKind::UInt32, "counter", "Counter");
        assert_eq!(
            decode_field(&field, &[0x0004, 0x0000]).unwrap(),
            DecodedValue::UInt32(4)
        );
        assert!(matches!(
            decode_field(&field, &[0x0004]),
            Err(DecodeError::IncompleteData {
                expected: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_sensor_block() {
        let registers: Vec<u16> = (0..17).collect();
        let block = RawRegisterBlock::new(addr(0x100), registers);
        let outcome = DecodePipeline::standard().decode(&block);

        assert!(outcome.is_clean());
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.readings.len(), 17);
        assert_eq!(
            outcome.reading("laser_work_time").unwrap().value,
            DecodedValue::UInt16(16)
        );
    }

    #[test]
    fn test_decode_uint32_both_byte_orders() {
        let plain = FieldDef::new(0x10, Block::Sensors, DecodeKind::UInt32, "counter", "Counter");
        let swapped = plain.swapped();

        assert_eq!(
            decode_field(&plain, &[0x0004, 0x0000]).unwrap(),
            DecodedValue::UInt32(4)
        );
        assert_eq!(
            decode_field(&swapped, &[0x0400, 0x0000]).unwrap(),
            DecodedValue::UInt32(4)
        );
        assert_eq!(
            decode_field(&swapped, &[0x7856, 0x3412]).unwrap(),
            DecodedValue::UInt32(0x1234_5678)
        );
    }

    #[test]
    fn test_float32_byte_order_per_range() {
        let pipeline = DecodePipeline::standard();
        // Limits take words as delivered; the generator setter swaps them.
        assert_eq!(
            pipeline.decode_at(addr(0x200), &[0x0000, 0x3FC0]).unwrap().value,
            DecodedValue::Float32(1.5)
        );
        assert_eq!(
            pipeline.decode_at(addr(0x502), &[0x0000, 0xC03F]).unwrap().value,
            DecodedValue::Float32(1.5)
        );
        assert_eq!(
            encode_float32_as(1.5, ByteOrder::Swapped),
            [0x0000, 0xC03F]
        );
        assert_eq!(encode_u16(1, ByteOrder::Swapped), 0x0100);
    }

    #[test]
    fn test_decode_switch_register_swapped() {
        let reading = DecodePipeline::standard()
            .decode_at(addr(0x500), &[0x0100])
            .unwrap();
        assert_eq!(reading.value, DecodedValue::UInt16(1));
    }

    #[test]
    fn test_decode_laser_status_block() {
        // bit 25 set, bit 26 clear, heater on; high word carries bits 16..31.
        let value: u32 = (1 << 25) | 1 | (1 << 27);
        let [low, high] = split_words(value).map(u16::swap_bytes);
        let block = RawRegisterBlock::new(addr(0x11E), vec![low, high]);
        let outcome = DecodePipeline::standard().decode(&block);

        let status = &outcome.reading("laser_control_board_status").unwrap().value;
        assert_eq!(status.bit("laser_work_mode"), Some(1));
        assert_eq!(status.bit("heater_on"), Some(1));
        assert_eq!(status.bit("signal_good"), Some(1));
        assert_eq!(status.bit("signal_ready"), Some(0));
    }

    #[test]
    fn test_decode_status_block_heater_bit_in_swapped_word() {
        let block = RawRegisterBlock::new(addr(0x11E), vec![0x0100, 0x0000]);
        let outcome = DecodePipeline::standard().decode(&block);
        let status = &outcome.reading("laser_control_board_status").unwrap().value;
        assert_eq!(status.bit("heater_on"), Some(1));
    }

    #[test]
    fn test_decode_quantumtron_bits() {
        let block = RawRegisterBlock::new(addr(0x122), vec![0x0600]);
        let outcome = DecodePipeline::standard().decode(&block);
        let value = &outcome.readings[0].value;
        assert_eq!(value.bit("frequency_mode_control"), Some(1));
        assert_eq!(value.bit("power_supply_on"), Some(0));
    }

    #[test]
    fn test_decode_reports_truncated_field() {
        let [low, _] = encode_float32(1.5);
        let block = RawRegisterBlock::new(addr(0x200), vec![0x0000, 0x3FC0, low]);
        let outcome = DecodePipeline::standard().decode(&block);

        assert_eq!(outcome.readings.len(), 1);
        assert_eq!(
            outcome.readings[0].value,
            DecodedValue::Float32(1.5)
        );
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            DecodeError::IncompleteData {
                field: "case_temperature_1_max",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_skips_unmapped_addresses() {
        let block = RawRegisterBlock::new(addr(0x110), vec![7, 0, 0]);
        let outcome = DecodePipeline::standard().decode(&block);
        assert_eq!(outcome.readings.len(), 1);
        assert_eq!(outcome.skipped, vec![addr(0x111), addr(0x112)]);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_decode_block_starting_mid_field() {
        // 0x201 is the high word of a float; it is not a field start.
        let block = RawRegisterBlock::new(addr(0x201), vec![0x3FC0, 0x0000, 0x3FC0]);
        let outcome = DecodePipeline::standard().decode(&block);
        assert_eq!(outcome.skipped, vec![addr(0x201)]);
        assert_eq!(outcome.readings[0].name, "case_temperature_1_max");
    }

    #[test]
    fn test_decode_at() {
        let pipeline = DecodePipeline::standard();
        let reading = pipeline.decode_at(addr(0x000), &[0x0400]).unwrap();
        assert_eq!(reading.value, DecodedValue::UInt16(4));
        assert_eq!(
            pipeline.decode_at(addr(0x111), &[0]).unwrap_err(),
            DecodeError::UnknownAddress { address: addr(0x111) }
        );
    }

    #[test]
    fn test_decode_empty_block() {
        let block = RawRegisterBlock::new(addr(0x100), Vec::new());
        let outcome = DecodePipeline::standard().decode(&block);
        assert!(outcome.readings.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}
