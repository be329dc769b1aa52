// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core value types shared by the catalog, the decode pipeline and the engine.
//!
//! # Word order
//!
//! Registers are stored in host order. The PDU codec performs the big-endian
//! wire-to-host swap of every register before a [`RawRegisterBlock`] is built,
//! and [`RawRegisterBlock::from_wire_bytes`] applies the same swap to raw
//! captures. Any further per-range swap is a property of the catalog field
//! (see [`ByteOrder`](crate::catalog::ByteOrder)) and is applied while
//! decoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, DecodeError, DecodeResult};

/// Default Modbus unit identifier.
pub const DEFAULT_UNIT_ID: u8 = 1;

// =============================================================================
// RegisterAddress
// =============================================================================

/// Offset into the flat device register space.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RegisterAddress(u16);

impl RegisterAddress {
    /// Creates an address.
    #[inline]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Returns the raw address.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the address `count` registers further, if it exists.
    #[inline]
    pub fn offset(self, count: u16) -> Option<Self> {
        self.0.checked_add(count).map(Self)
    }
}

impl From<u16> for RegisterAddress {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<RegisterAddress> for u16 {
    fn from(address: RegisterAddress) -> Self {
        address.0
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

impl FromStr for RegisterAddress {
    type Err = CatalogError;

    /// Parses `0x11E`, `0X11e` or plain decimal `286`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => trimmed.parse::<u16>(),
        };
        parsed.map(Self).map_err(|_| CatalogError::InvalidAddress {
            input: s.to_string(),
        })
    }
}

// =============================================================================
// RawRegisterBlock
// =============================================================================

/// Host-order registers returned by one read, with the address they start at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRegisterBlock {
    start: RegisterAddress,
    registers: Vec<u16>,
}

impl RawRegisterBlock {
    /// Creates a block from host-order registers.
    pub fn new(start: RegisterAddress, registers: Vec<u16>) -> Self {
        Self { start, registers }
    }

    /// Creates a block from raw wire bytes, two big-endian bytes per register.
    pub fn from_wire_bytes(start: RegisterAddress, bytes: &[u8]) -> DecodeResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(DecodeError::InvalidWireLength { len: bytes.len() });
        }
        let registers = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { start, registers })
    }

    /// Parses a hex capture such as `"00 04 00 00"` or `"00040000"`.
    ///
    /// Whitespace, `:` and `-` separators are ignored.
    pub fn from_hex(start: RegisterAddress, text: &str) -> DecodeResult<Self> {
        let digits: Vec<u8> = text
            .bytes()
            .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
            .collect();

        if digits.len() % 2 != 0 {
            return Err(DecodeError::invalid_capture(format!(
                "odd number of hex digits ({})",
                digits.len()
            )));
        }

        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks_exact(2) {
            let text = std::str::from_utf8(pair)
                .map_err(|_| DecodeError::invalid_capture("non-ASCII input"))?;
            let byte = u8::from_str_radix(text, 16)
                .map_err(|_| DecodeError::invalid_capture(format!("invalid hex byte '{text}'")))?;
            bytes.push(byte);
        }

        Self::from_wire_bytes(start, &bytes)
    }

    /// Returns the start address.
    #[inline]
    pub fn start(&self) -> RegisterAddress {
        self.start
    }

    /// Returns the host-order registers.
    #[inline]
    pub fn registers(&self) -> &[u16] {
        &self.registers
    }

    /// Returns the number of registers.
    #[inline]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` if the block carries no registers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Exclusive end address, widened so a block ending at `0xFFFF` fits.
    pub fn end(&self) -> u32 {
        u32::from(self.start.value()) + self.registers.len() as u32
    }

    /// Returns `true` if `address` lies inside the block.
    pub fn contains(&self, address: RegisterAddress) -> bool {
        address >= self.start && u32::from(address.value()) < self.end()
    }

    /// Returns the register at `address`.
    pub fn get(&self, address: RegisterAddress) -> Option<u16> {
        let index = address.value().checked_sub(self.start.value())?;
        self.registers.get(usize::from(index)).copied()
    }

    /// Returns the registers from `address` to the end of the block.
    pub fn tail(&self, address: RegisterAddress) -> &[u16] {
        match address.value().checked_sub(self.start.value()) {
            Some(index) => self.registers.get(usize::from(index)..).unwrap_or(&[]),
            None => &[],
        }
    }

    /// Serializes the registers back to big-endian wire bytes.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        self.registers.iter().flat_map(|r| r.to_be_bytes()).collect()
    }
}

// =============================================================================
// Decoded values
// =============================================================================

/// One named bit or bit group extracted from a bitfield register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitReading {
    /// Machine name.
    pub name: &'static str,
    /// Human label.
    pub label: &'static str,
    /// Lowest bit position.
    pub position: u8,
    /// Number of bits (1 or 2).
    pub width: u8,
    /// Extracted value: `0/1` for a single bit, `0..=3` for a 2-bit group.
    pub value: u8,
}

impl BitReading {
    /// Returns `true` if any bit of the reading is set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.value != 0
    }
}

/// A typed value rebuilt from one or two registers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum DecodedValue {
    /// Single register scalar.
    #[serde(rename = "uint16")]
    UInt16(u16),
    /// Two registers, low word first.
    #[serde(rename = "uint32")]
    UInt32(u32),
    /// Two registers, low word first, reinterpreted as IEEE-754 binary32.
    #[serde(rename = "float32")]
    Float32(f32),
    /// Named bits of one register or of a two-register status block.
    #[serde(rename = "bitfield")]
    BitField(Vec<BitReading>),
}

impl DecodedValue {
    /// Returns the variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::Float32(_) => "float32",
            Self::BitField(_) => "bitfield",
        }
    }

    /// Returns the value if this is a `UInt16`.
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::UInt16(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if this is a `UInt32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if this is a `Float32`.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the bit readings if this is a `BitField`.
    pub fn bits(&self) -> Option<&[BitReading]> {
        match self {
            Self::BitField(bits) => Some(bits),
            _ => None,
        }
    }

    /// Looks up one named bit or group.
    pub fn bit(&self, name: &str) -> Option<u8> {
        self.bits()?
            .iter()
            .find(|bit| bit.name == name)
            .map(|bit| bit.value)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::BitField(bits) => {
                let mut first = true;
                for bit in bits.iter().filter(|bit| bit.is_set()) {
                    if !first {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", bit.name, bit.value)?;
                    first = false;
                }
                if first {
                    f.write_str("(none set)")?;
                }
                Ok(())
            }
        }
    }
}

/// A decoded catalog field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Start address of the field.
    pub address: RegisterAddress,
    /// Machine name.
    pub name: &'static str,
    /// Human label.
    pub label: &'static str,
    /// Decoded value.
    pub value: DecodedValue,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.address, self.label, self.value)
    }
}

// =============================================================================
// Control values
// =============================================================================

/// Laser operating mode written to the mode control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Automatic operation.
    Auto,
    /// Manual operation.
    Manual,
    /// Duty (standby) operation.
    Duty,
    /// Preparation before work.
    Prepare,
    /// Lasing.
    Work,
}

impl Mode {
    /// All modes in register order.
    pub const ALL: [Mode; 5] = [
        Mode::Auto,
        Mode::Manual,
        Mode::Duty,
        Mode::Prepare,
        Mode::Work,
    ];

    /// Returns the mode number.
    ///
    /// The mode control register stores it byte-swapped; writers convert it
    /// with the register's [`ByteOrder`](crate::catalog::ByteOrder).
    #[inline]
    pub const fn register_value(self) -> u16 {
        match self {
            Self::Auto => 0,
            Self::Manual => 1,
            Self::Duty => 2,
            Self::Prepare => 3,
            Self::Work => 4,
        }
    }

    /// Looks up a mode by number.
    pub fn from_register(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.register_value() == value)
    }

    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Duty => "duty",
            Self::Prepare => "prepare",
            Self::Work => "work",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| format!("unknown mode '{s}' (expected auto, manual, duty, prepare or work)"))
    }
}

/// On/off state of a generator setter switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    /// Switched off.
    Off,
    /// Switched on.
    On,
}

impl SwitchState {
    /// Returns the switch value, `1` for on.
    ///
    /// Switch registers store it byte-swapped; writers convert it with the
    /// register's [`ByteOrder`](crate::catalog::ByteOrder).
    #[inline]
    pub const fn register_value(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }
}

impl From<bool> for SwitchState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
        }
    }
}

impl FromStr for SwitchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(Self::On),
            "off" | "0" | "false" => Ok(Self::Off),
            _ => Err(format!("unknown switch state '{s}' (expected on or off)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = RegisterAddress::new(0x11E);
        assert_eq!(addr.to_string(), "0x11E");
        assert_eq!("0x11E".parse::<RegisterAddress>().unwrap(), addr);
        assert_eq!("0x11e".parse::<RegisterAddress>().unwrap(), addr);
        assert_eq!("286".parse::<RegisterAddress>().unwrap(), addr);
        assert!("0xZZ".parse::<RegisterAddress>().is_err());
        assert!("70000".parse::<RegisterAddress>().is_err());
    }

    #[test]
    fn test_address_offset() {
        assert_eq!(
            RegisterAddress::new(0x100).offset(16),
            Some(RegisterAddress::new(0x110))
        );
        assert_eq!(RegisterAddress::new(u16::MAX).offset(1), None);
    }

    #[test]
    fn test_from_wire_bytes_swaps_to_host_order() {
        let block =
            RawRegisterBlock::from_wire_bytes(RegisterAddress::new(0x11E), &[0x00, 0x04, 0x12, 0x34])
                .unwrap();
        assert_eq!(block.registers(), &[0x0004, 0x1234]);
        assert_eq!(block.to_wire_bytes(), vec![0x00, 0x04, 0x12, 0x34]);
    }

    #[test]
    fn test_from_wire_bytes_odd_length() {
        let err = RawRegisterBlock::from_wire_bytes(RegisterAddress::new(0), &[0x00, 0x01, 0x02])
            .unwrap_err();
        assert_eq!(err, DecodeError::InvalidWireLength { len: 3 });
    }

    #[test]
    fn test_from_hex() {
        let block = RawRegisterBlock::from_hex(RegisterAddress::new(0x200), "00 04:00-00").unwrap();
        assert_eq!(block.registers(), &[0x0004, 0x0000]);

        assert!(RawRegisterBlock::from_hex(RegisterAddress::new(0), "0g00").is_err());
        assert!(RawRegisterBlock::from_hex(RegisterAddress::new(0), "000").is_err());
    }

    #[test]
    fn test_block_bounds() {
        let block = RawRegisterBlock::new(RegisterAddress::new(0x100), vec![1, 2, 3]);
        assert_eq!(block.end(), 0x103);
        assert!(block.contains(RegisterAddress::new(0x102)));
        assert!(!block.contains(RegisterAddress::new(0x103)));
        assert!(!block.contains(RegisterAddress::new(0x0FF)));
        assert_eq!(block.get(RegisterAddress::new(0x101)), Some(2));
        assert_eq!(block.tail(RegisterAddress::new(0x101)), &[2, 3]);
        assert!(block.tail(RegisterAddress::new(0x200)).is_empty());
        assert!(block.tail(RegisterAddress::new(0x050)).is_empty());
    }

    #[test]
    fn test_mode_encoding() {
        assert_eq!(Mode::Auto.register_value(), 0);
        assert_eq!(Mode::Work.register_value(), 4);
        assert_eq!(Mode::from_register(3), Some(Mode::Prepare));
        assert_eq!(Mode::from_register(9), None);
        assert_eq!("Duty".parse::<Mode>().unwrap(), Mode::Duty);
        assert!("lasing".parse::<Mode>().is_err());
    }

    #[test]
    fn test_switch_state() {
        assert_eq!("ON".parse::<SwitchState>().unwrap(), SwitchState::On);
        assert_eq!("0".parse::<SwitchState>().unwrap(), SwitchState::Off);
        assert_eq!(SwitchState::from(true).register_value(), 1);
        assert!("maybe".parse::<SwitchState>().is_err());
    }

    #[test]
    fn test_decoded_value_display() {
        let value = DecodedValue::BitField(vec![
            BitReading {
                name: "heater_on",
                label: "Heater on",
                position: 0,
                width: 1,
                value: 1,
            },
            BitReading {
                name: "signal_good",
                label: "Signal good",
                position: 27,
                width: 1,
                value: 0,
            },
        ]);
        assert_eq!(value.to_string(), "heater_on=1");
        assert_eq!(value.bit("signal_good"), Some(0));
        assert_eq!(value.bit("missing"), None);
        assert_eq!(DecodedValue::UInt16(7).to_string(), "7");
    }

    #[test]
    fn test_decoded_value_serializes_tagged() {
        let json = serde_json::to_string(&DecodedValue::UInt32(4)).unwrap();
        assert_eq!(json, r#"{"type":"uint32","value":4}"#);
    }
}
