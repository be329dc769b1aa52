// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register catalog for the laser subsystem.
//!
//! The device exposes a flat holding-register space partitioned into five
//! blocks:
//!
//! ```text
//! 0x000        Mode control             uint16                          swapped
//! 0x100-0x110  Live sensors             uint16 x 17                     as delivered
//! 0x11E-0x12B  Block status             2 status blocks + 10 bitfields  swapped
//! 0x200-0x239  Limits and targets       float32 x 29                    as delivered
//! 0x500-0x505  Generator setter         2 switches + 2 float32          swapped
//! ```
//!
//! Byte order is not uniform across the map. The codec already turns each
//! big-endian wire register into a host-order word. Fields marked
//! [`ByteOrder::Swapped`] hold little-endian registers on the device, so each
//! of their words is byte-swapped once more before use and before writing.
//!
//! The catalog is immutable. [`RegisterCatalog::standard`] returns the
//! built-in table; custom catalogs are validated on construction.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{CatalogError, CatalogResult};
use crate::types::RegisterAddress;

/// Address of the mode control register.
pub const MODE_CONTROL_ADDRESS: RegisterAddress = RegisterAddress::new(0x000);

/// Address of the thermal stabilization switch.
pub const THERMAL_STABILIZATION_SWITCH: RegisterAddress = RegisterAddress::new(0x500);

/// Address of the current pulses switch.
pub const CURRENT_PULSES_SWITCH: RegisterAddress = RegisterAddress::new(0x501);

// =============================================================================
// Blocks
// =============================================================================

/// Semantic partition of the register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    /// Operating mode register.
    ModeControl,
    /// Live sensor readings.
    Sensors,
    /// Status bitfields of the control boards and power supplies.
    BlockStatus,
    /// Alarm limits, crystal targets and PID gains.
    LimitsAndTargets,
    /// Generator switches and temperature setpoints.
    GeneratorSetter,
}

/// One read request covering part of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadSpan {
    /// First register.
    pub start: RegisterAddress,
    /// Number of registers.
    pub count: u16,
}

impl ReadSpan {
    const fn new(start: u16, count: u16) -> Self {
        Self {
            start: RegisterAddress::new(start),
            count,
        }
    }
}

const MODE_CONTROL_SPANS: &[ReadSpan] = &[ReadSpan::new(0x000, 1)];
const SENSOR_SPANS: &[ReadSpan] = &[ReadSpan::new(0x100, 17)];
const BLOCK_STATUS_SPANS: &[ReadSpan] = &[
    ReadSpan::new(0x11E, 2),
    ReadSpan::new(0x120, 2),
    ReadSpan::new(0x122, 10),
];
const LIMIT_SPANS: &[ReadSpan] = &[ReadSpan::new(0x200, 58)];
const GENERATOR_SPANS: &[ReadSpan] = &[
    ReadSpan::new(0x500, 1),
    ReadSpan::new(0x501, 1),
    ReadSpan::new(0x502, 2),
    ReadSpan::new(0x504, 2),
];

impl Block {
    /// All blocks in address order.
    pub const ALL: [Block; 5] = [
        Block::ModeControl,
        Block::Sensors,
        Block::BlockStatus,
        Block::LimitsAndTargets,
        Block::GeneratorSetter,
    ];

    /// Returns the configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ModeControl => "mode_control",
            Self::Sensors => "sensors",
            Self::BlockStatus => "block_status",
            Self::LimitsAndTargets => "limits_and_targets",
            Self::GeneratorSetter => "generator_setter",
        }
    }

    /// Returns the first address of the block.
    pub const fn base(self) -> RegisterAddress {
        match self {
            Self::ModeControl => RegisterAddress::new(0x000),
            Self::Sensors => RegisterAddress::new(0x100),
            Self::BlockStatus => RegisterAddress::new(0x11E),
            Self::LimitsAndTargets => RegisterAddress::new(0x200),
            Self::GeneratorSetter => RegisterAddress::new(0x500),
        }
    }

    /// Returns the reads needed to poll the whole block.
    ///
    /// Spans start at distinct addresses so they never collapse in the
    /// address-keyed request queue.
    pub const fn read_spans(self) -> &'static [ReadSpan] {
        match self {
            Self::ModeControl => MODE_CONTROL_SPANS,
            Self::Sensors => SENSOR_SPANS,
            Self::BlockStatus => BLOCK_STATUS_SPANS,
            Self::LimitsAndTargets => LIMIT_SPANS,
            Self::GeneratorSetter => GENERATOR_SPANS,
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Block {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|b| b.name() == normalized)
            .ok_or_else(|| CatalogError::UnknownBlock {
                name: s.to_string(),
            })
    }
}

// =============================================================================
// Field definitions
// =============================================================================

/// A named bit or 2-bit group inside a bitfield register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitDef {
    /// Lowest bit position.
    pub position: u8,
    /// Number of bits (1 or 2).
    pub width: u8,
    /// Machine name.
    pub name: &'static str,
    /// Human label.
    pub label: &'static str,
}

impl BitDef {
    /// Single bit at `position`.
    pub const fn flag(position: u8, name: &'static str, label: &'static str) -> Self {
        Self {
            position,
            width: 1,
            name,
            label,
        }
    }

    /// Two-bit group at `position` and `position + 1`.
    pub const fn group(position: u8, name: &'static str, label: &'static str) -> Self {
        Self {
            position,
            width: 2,
            name,
            label,
        }
    }
}

/// Byte order of a field's registers relative to the codec's host-order words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Words are used as delivered.
    #[default]
    AsDelivered,
    /// Each word is byte-swapped.
    Swapped,
}

impl ByteOrder {
    /// Converts one word between host order and the field's order.
    ///
    /// The conversion is its own inverse, so it serves both decoding and
    /// encoding.
    #[inline]
    pub const fn apply(self, word: u16) -> u16 {
        match self {
            Self::AsDelivered => word,
            Self::Swapped => word.swap_bytes(),
        }
    }

    /// Returns the order name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::AsDelivered => "as_delivered",
            Self::Swapped => "swapped",
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a field's registers become a [`DecodedValue`](crate::types::DecodedValue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// One register scalar.
    UInt16,
    /// Two registers, low word first.
    UInt32,
    /// Two registers, low word first, as IEEE-754 binary32.
    Float32,
    /// Named bits of a single register.
    Bits(&'static [BitDef]),
    /// Named bits of a two-register status block combined low word first.
    StatusBlock(&'static [BitDef]),
}

impl DecodeKind {
    /// Number of registers the kind consumes.
    pub const fn width(&self) -> u16 {
        match self {
            Self::UInt16 | Self::Bits(_) => 1,
            Self::UInt32 | Self::Float32 | Self::StatusBlock(_) => 2,
        }
    }

    /// Returns the kind name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
            Self::Bits(_) => "bitfield",
            Self::StatusBlock(_) => "status_block",
        }
    }

    /// Returns the bit definitions of bitfield kinds.
    pub const fn bit_defs(&self) -> &'static [BitDef] {
        match self {
            Self::Bits(defs) | Self::StatusBlock(defs) => defs,
            _ => &[],
        }
    }
}

/// One semantic field of the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// First register of the field.
    pub address: RegisterAddress,
    /// Machine name, unique within the catalog.
    pub name: &'static str,
    /// Human label.
    pub label: &'static str,
    /// Owning block.
    pub block: Block,
    /// Decode rule.
    pub kind: DecodeKind,
    /// Byte order of each register.
    pub byte_order: ByteOrder,
}

impl FieldDef {
    /// Creates a field definition.
    pub const fn new(
        address: u16,
        block: Block,
        kind: DecodeKind,
        name: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            address: RegisterAddress::new(address),
            name,
            label,
            block,
            kind,
            byte_order: ByteOrder::AsDelivered,
        }
    }

    /// Returns the field with byte-swapped registers.
    pub const fn swapped(self) -> Self {
        Self {
            byte_order: ByteOrder::Swapped,
            ..self
        }
    }

    /// Registers the field occupies.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.kind.width()
    }

    /// Exclusive end address.
    pub fn end(&self) -> u32 {
        u32::from(self.address.value()) + u32::from(self.width())
    }
}

// =============================================================================
// RegisterCatalog
// =============================================================================

/// Immutable table of fields, sorted by address.
#[derive(Debug, Clone)]
pub struct RegisterCatalog {
    fields: Cow<'static, [FieldDef]>,
}

static STANDARD: RegisterCatalog = RegisterCatalog {
    fields: Cow::Borrowed(STANDARD_FIELDS),
};

impl RegisterCatalog {
    /// Returns the built-in laser subsystem catalog.
    pub fn standard() -> &'static RegisterCatalog {
        &STANDARD
    }

    /// Builds a catalog from arbitrary fields.
    ///
    /// Fields are sorted by address. Overlapping spans, duplicate names and
    /// bits outside the field width are rejected.
    pub fn from_fields(mut fields: Vec<FieldDef>) -> CatalogResult<Self> {
        fields.sort_by_key(|f| f.address);
        validate_fields(&fields)?;
        Ok(Self {
            fields: Cow::Owned(fields),
        })
    }

    /// Returns the field starting exactly at `address`.
    pub fn field(&self, address: RegisterAddress) -> Option<&FieldDef> {
        self.fields
            .binary_search_by_key(&address, |f| f.address)
            .ok()
            .map(|index| &self.fields[index])
    }

    /// Returns the field whose span includes `address`.
    pub fn covering(&self, address: RegisterAddress) -> Option<&FieldDef> {
        let index = self.fields.partition_point(|f| f.address <= address);
        let candidate = self.fields.get(index.checked_sub(1)?)?;
        (u32::from(address.value()) < candidate.end()).then_some(candidate)
    }

    /// Returns the byte order of the register at `address`.
    ///
    /// Addresses no field covers are used as delivered.
    pub fn byte_order(&self, address: RegisterAddress) -> ByteOrder {
        self.covering(address)
            .map(|f| f.byte_order)
            .unwrap_or_default()
    }

    /// Looks up a field by name.
    pub fn find(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the fields of one block.
    pub fn block_fields(&self, block: Block) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(move |f| f.block == block)
    }

    /// Iterates over all fields in address order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    /// Returns all fields in address order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the catalog has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates the table.
    pub fn validate(&self) -> CatalogResult<()> {
        validate_fields(&self.fields)
    }
}

impl Default for RegisterCatalog {
    fn default() -> Self {
        STANDARD.clone()
    }
}

fn validate_fields(fields: &[FieldDef]) -> CatalogResult<()> {
    let mut names = HashSet::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        if !names.insert(field.name) {
            return Err(CatalogError::DuplicateName { name: field.name });
        }

        if let Some(prev) = index.checked_sub(1).and_then(|i| fields.get(i)) {
            if u32::from(field.address.value()) < prev.end() {
                return Err(CatalogError::Overlap {
                    first: prev.name,
                    second: field.name,
                    address: field.address,
                });
            }
        }

        let bits = u32::from(field.width()) * 16;
        for bit in field.kind.bit_defs() {
            if !(1..=2).contains(&bit.width) || u32::from(bit.position) + u32::from(bit.width) > bits
            {
                return Err(CatalogError::BitOutOfRange {
                    field: field.name,
                    bit: bit.name,
                });
            }
        }
    }

    Ok(())
}

// =============================================================================
// Standard table
// =============================================================================

use Block::{BlockStatus, GeneratorSetter, LimitsAndTargets, ModeControl, Sensors};
use DecodeKind::{Float32, UInt16};

const LASER_BOARD_BITS: &[BitDef] = &[
    BitDef::flag(0, "heater_on", "Heater on"),
    BitDef::flag(1, "case_temperature_1_below_min", "Case temperature 1 below minimum"),
    BitDef::flag(2, "case_temperature_1_above_max", "Case temperature 1 above maximum"),
    BitDef::flag(3, "case_temperature_2_below_min", "Case temperature 2 below minimum"),
    BitDef::flag(4, "case_temperature_2_above_max", "Case temperature 2 above maximum"),
    BitDef::flag(5, "coolant_temperature_1_below_min", "Coolant temperature 1 below minimum"),
    BitDef::flag(6, "coolant_temperature_1_above_max", "Coolant temperature 1 above maximum"),
    BitDef::flag(7, "coolant_temperature_2_below_min", "Coolant temperature 2 below minimum"),
    BitDef::flag(8, "coolant_temperature_2_above_max", "Coolant temperature 2 above maximum"),
    BitDef::flag(9, "coolant_flow_rate_1_below_min", "Coolant flow rate 1 below minimum"),
    BitDef::flag(10, "coolant_flow_rate_1_above_max", "Coolant flow rate 1 above maximum"),
    BitDef::flag(11, "coolant_flow_rate_2_below_min", "Coolant flow rate 2 below minimum"),
    BitDef::flag(12, "coolant_flow_rate_2_above_max", "Coolant flow rate 2 above maximum"),
    BitDef::flag(13, "coolant_flow_rate_3_below_min", "Coolant flow rate 3 below minimum"),
    BitDef::flag(14, "coolant_flow_rate_3_above_max", "Coolant flow rate 3 above maximum"),
    BitDef::flag(15, "air_humidity_1_below_min", "Air humidity 1 below minimum"),
    BitDef::flag(16, "air_humidity_1_above_max", "Air humidity 1 above maximum"),
    BitDef::flag(17, "air_temperature_1_below_min", "Air temperature 1 below minimum"),
    BitDef::flag(18, "air_temperature_1_above_max", "Air temperature 1 above maximum"),
    BitDef::flag(19, "air_humidity_2_below_min", "Air humidity 2 below minimum"),
    BitDef::flag(20, "air_humidity_2_above_max", "Air humidity 2 above maximum"),
    BitDef::flag(21, "air_temperature_2_below_min", "Air temperature 2 below minimum"),
    BitDef::flag(22, "air_temperature_2_above_max", "Air temperature 2 above maximum"),
    BitDef::flag(23, "laser_power_below_min", "Laser power below minimum"),
    BitDef::flag(24, "laser_power_above_max", "Laser power above maximum"),
    BitDef::group(25, "laser_work_mode", "Laser work mode"),
    BitDef::flag(27, "signal_good", "Signal good"),
    BitDef::flag(28, "signal_ready", "Signal ready"),
    BitDef::flag(29, "master_oscillator_pump_sync", "Master oscillator pump sync"),
    BitDef::flag(30, "amplifier_pump_sync", "Amplifier pump sync"),
    BitDef::flag(31, "radiation_generation_sync", "Radiation generation sync"),
];

const GENERATOR_STATUS_BITS: &[BitDef] = &[
    BitDef::flag(0, "thermal_stabilization_enabled", "Thermal stabilization enabled"),
    BitDef::flag(1, "laser_diode_temperature_normal", "Laser diode temperature normal"),
    BitDef::flag(2, "laser_diode_overheated", "Laser diode overheated"),
    BitDef::flag(3, "doubler_crystal_temperature_normal", "Doubler crystal temperature normal"),
    BitDef::flag(4, "doubler_crystal_overheated", "Doubler crystal overheated"),
    BitDef::flag(5, "supply_12v_enabled", "12 V supply enabled"),
    BitDef::flag(6, "laser_module_operational", "Laser module operational"),
    BitDef::flag(7, "diode_voltage_regulator_enabled", "Diode voltage regulator enabled"),
    BitDef::flag(8, "diode_current_pulses_enabled", "Diode current pulses enabled"),
    BitDef::flag(9, "cooler_overheated", "Cooler overheated"),
    BitDef::flag(10, "power_transistor_overheated", "Power transistor overheated"),
    BitDef::flag(11, "diode_overcurrent", "Diode overcurrent"),
    BitDef::flag(12, "transistor_overvoltage", "Transistor overvoltage"),
    BitDef::flag(13, "ao_shutter_driver_failure", "AO shutter driver failure"),
    BitDef::flag(14, "external_lock", "External lock"),
    BitDef::flag(15, "system_config_loaded", "System configuration loaded"),
    BitDef::flag(16, "driver_config_loaded", "Driver configuration loaded"),
    BitDef::flag(17, "timing_config_loaded", "Timing configuration loaded"),
    BitDef::flag(18, "diode_thermostab_config_loaded", "Diode thermostabilization configuration loaded"),
    BitDef::flag(19, "crystal_thermostab_config_loaded", "Crystal thermostabilization configuration loaded"),
];

const QUANTUMTRON_BITS: &[BitDef] = &[
    BitDef::flag(0, "power_supply_on", "Power supply on"),
    BitDef::flag(1, "frequency_mode_control", "Frequency mode control"),
    BitDef::flag(2, "external_sync", "External synchronization"),
    BitDef::flag(3, "power_supply_ready", "Power supply ready"),
];

const fn sensor(address: u16, name: &'static str, label: &'static str) -> FieldDef {
    FieldDef::new(address, Sensors, UInt16, name, label)
}

const fn limit(address: u16, name: &'static str, label: &'static str) -> FieldDef {
    FieldDef::new(address, LimitsAndTargets, Float32, name, label)
}

const fn quantumtron(address: u16, name: &'static str, label: &'static str) -> FieldDef {
    FieldDef::new(address, BlockStatus, DecodeKind::Bits(QUANTUMTRON_BITS), name, label).swapped()
}

const fn generator(
    address: u16,
    kind: DecodeKind,
    name: &'static str,
    label: &'static str,
) -> FieldDef {
    FieldDef::new(address, GeneratorSetter, kind, name, label).swapped()
}

const STANDARD_FIELDS: &[FieldDef] = &[
    FieldDef::new(0x000, ModeControl, UInt16, "mode", "Operating mode").swapped(),
    sensor(0x100, "board_operating_mode", "Board operating mode"),
    sensor(0x101, "laser_operating_mode", "Laser operating mode"),
    sensor(0x102, "case_temperature_1", "Case temperature 1"),
    sensor(0x103, "case_temperature_2", "Case temperature 2"),
    sensor(0x104, "coolant_temperature_1", "Coolant temperature 1"),
    sensor(0x105, "coolant_temperature_2", "Coolant temperature 2"),
    sensor(0x106, "coolant_flow_rate_1", "Coolant flow rate 1"),
    sensor(0x107, "coolant_flow_rate_2", "Coolant flow rate 2"),
    sensor(0x108, "coolant_flow_rate_3", "Coolant flow rate 3"),
    sensor(0x109, "air_humidity_1", "Air humidity 1"),
    sensor(0x10A, "air_temperature_1", "Air temperature 1"),
    sensor(0x10B, "air_humidity_2", "Air humidity 2"),
    sensor(0x10C, "air_temperature_2", "Air temperature 2"),
    sensor(0x10D, "laser_power", "Laser power"),
    sensor(0x10E, "crystal_temperature_1", "Crystal temperature 1"),
    sensor(0x10F, "crystal_temperature_2", "Crystal temperature 2"),
    sensor(0x110, "laser_work_time", "Laser work time (pulses)"),
    FieldDef::new(
        0x11E,
        BlockStatus,
        DecodeKind::StatusBlock(LASER_BOARD_BITS),
        "laser_control_board_status",
        "Laser control board status",
    )
    .swapped(),
    FieldDef::new(
        0x120,
        BlockStatus,
        DecodeKind::StatusBlock(GENERATOR_STATUS_BITS),
        "power_supply_control_status",
        "Power supply control status",
    )
    .swapped(),
    quantumtron(0x122, "quantumtron_power_supply_status_1", "Quantumtron power supply 1"),
    quantumtron(0x123, "quantumtron_power_supply_status_2", "Quantumtron power supply 2"),
    quantumtron(0x124, "quantumtron_power_supply_status_3", "Quantumtron power supply 3"),
    quantumtron(0x125, "quantumtron_power_supply_status_4", "Quantumtron power supply 4"),
    quantumtron(0x126, "quantumtron_power_supply_status_5", "Quantumtron power supply 5"),
    quantumtron(0x127, "quantumtron_power_supply_status_6", "Quantumtron power supply 6"),
    quantumtron(0x128, "quantumtron_power_supply_status_7", "Quantumtron power supply 7"),
    quantumtron(0x129, "quantumtron_power_supply_status_8", "Quantumtron power supply 8"),
    quantumtron(0x12A, "quantumtron_power_supply_status_9", "Quantumtron power supply 9"),
    quantumtron(0x12B, "quantumtron_power_supply_status_10", "Quantumtron power supply 10"),
    limit(0x200, "case_temperature_1_min", "Case temperature 1 minimum"),
    limit(0x202, "case_temperature_1_max", "Case temperature 1 maximum"),
    limit(0x204, "case_temperature_2_min", "Case temperature 2 minimum"),
    limit(0x206, "case_temperature_2_max", "Case temperature 2 maximum"),
    limit(0x208, "coolant_temperature_1_min", "Coolant temperature 1 minimum"),
    limit(0x20A, "coolant_temperature_1_max", "Coolant temperature 1 maximum"),
    limit(0x20C, "coolant_temperature_2_min", "Coolant temperature 2 minimum"),
    limit(0x20E, "coolant_temperature_2_max", "Coolant temperature 2 maximum"),
    limit(0x210, "coolant_flow_rate_1_min", "Coolant flow rate 1 minimum"),
    limit(0x212, "coolant_flow_rate_1_max", "Coolant flow rate 1 maximum"),
    limit(0x214, "coolant_flow_rate_2_min", "Coolant flow rate 2 minimum"),
    limit(0x216, "coolant_flow_rate_2_max", "Coolant flow rate 2 maximum"),
    limit(0x218, "coolant_flow_rate_3_min", "Coolant flow rate 3 minimum"),
    limit(0x21A, "coolant_flow_rate_3_max", "Coolant flow rate 3 maximum"),
    limit(0x21C, "air_humidity_1_min", "Air humidity 1 minimum"),
    limit(0x21E, "air_humidity_1_max", "Air humidity 1 maximum"),
    limit(0x220, "air_temperature_1_min", "Air temperature 1 minimum"),
    limit(0x222, "air_temperature_1_max", "Air temperature 1 maximum"),
    limit(0x224, "air_humidity_2_min", "Air humidity 2 minimum"),
    limit(0x226, "air_humidity_2_max", "Air humidity 2 maximum"),
    limit(0x228, "air_temperature_2_min", "Air temperature 2 minimum"),
    limit(0x22A, "air_temperature_2_max", "Air temperature 2 maximum"),
    limit(0x22C, "laser_power_min", "Laser power minimum"),
    limit(0x22E, "laser_power_max", "Laser power maximum"),
    limit(0x230, "crystal_temperature_target_1", "Crystal temperature target 1"),
    limit(0x232, "crystal_temperature_target_2", "Crystal temperature target 2"),
    limit(0x234, "lbo_heater_pid_kp", "LBO heater PID Kp"),
    limit(0x236, "lbo_heater_pid_ki", "LBO heater PID Ki"),
    limit(0x238, "lbo_heater_pid_kd", "LBO heater PID Kd"),
    generator(
        0x500,
        UInt16,
        "thermal_stabilization_switch",
        "Thermal stabilization switch",
    ),
    generator(0x501, UInt16, "current_pulses_switch", "Current pulses switch"),
    generator(
        0x502,
        Float32,
        "diode_temperature",
        "Laser diode temperature setpoint",
    ),
    generator(
        0x504,
        Float32,
        "crystal_temperature",
        "Doubler crystal temperature setpoint",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        let catalog = RegisterCatalog::standard();
        catalog.validate().unwrap();
        assert!(catalog
            .fields()
            .windows(2)
            .all(|pair| pair[0].address < pair[1].address));
    }

    #[test]
    fn test_standard_block_sizes() {
        let catalog = RegisterCatalog::standard();
        assert_eq!(catalog.block_fields(Block::ModeControl).count(), 1);
        assert_eq!(catalog.block_fields(Block::Sensors).count(), 17);
        assert_eq!(catalog.block_fields(Block::BlockStatus).count(), 12);
        assert_eq!(catalog.block_fields(Block::LimitsAndTargets).count(), 29);
        assert_eq!(catalog.block_fields(Block::GeneratorSetter).count(), 4);
        assert_eq!(catalog.len(), 63);
    }

    #[test]
    fn test_status_block_bit_counts() {
        let catalog = RegisterCatalog::standard();
        let laser = catalog.field(RegisterAddress::new(0x11E)).unwrap();
        assert_eq!(laser.width(), 2);
        // 30 single bits plus one 2-bit group cover all 32 bits.
        let covered: u32 = laser
            .kind
            .bit_defs()
            .iter()
            .map(|b| u32::from(b.width))
            .sum();
        assert_eq!(covered, 32);

        let generator = catalog.field(RegisterAddress::new(0x120)).unwrap();
        assert_eq!(generator.kind.bit_defs().len(), 20);

        let group = laser
            .kind
            .bit_defs()
            .iter()
            .find(|b| b.name == "laser_work_mode")
            .unwrap();
        assert_eq!((group.position, group.width), (25, 2));
    }

    #[test]
    fn test_read_spans_cover_block_fields() {
        let catalog = RegisterCatalog::standard();
        for block in Block::ALL {
            for field in catalog.block_fields(block) {
                let covered = block.read_spans().iter().any(|span| {
                    field.address >= span.start
                        && field.end() <= u32::from(span.start.value()) + u32::from(span.count)
                });
                assert!(covered, "{} not covered by {} spans", field.name, block);
            }
        }
    }

    #[test]
    fn test_lookup() {
        let catalog = RegisterCatalog::standard();
        assert_eq!(catalog.field(MODE_CONTROL_ADDRESS).unwrap().name, "mode");
        assert!(catalog.field(RegisterAddress::new(0x201)).is_none());
        assert_eq!(
            catalog.covering(RegisterAddress::new(0x201)).unwrap().name,
            "case_temperature_1_min"
        );
        assert!(catalog.covering(RegisterAddress::new(0x111)).is_none());
        assert!(catalog.covering(RegisterAddress::new(0x0FF)).is_none());
        assert_eq!(
            catalog.find("crystal_temperature").unwrap().address,
            RegisterAddress::new(0x504)
        );
    }

    #[test]
    fn test_byte_order_per_range() {
        let catalog = RegisterCatalog::standard();
        let order = |address: u16| catalog.byte_order(RegisterAddress::new(address));

        assert_eq!(order(0x000), ByteOrder::Swapped);
        assert_eq!(order(0x100), ByteOrder::AsDelivered);
        assert_eq!(order(0x110), ByteOrder::AsDelivered);
        assert_eq!(order(0x11F), ByteOrder::Swapped);
        assert_eq!(order(0x12B), ByteOrder::Swapped);
        assert_eq!(order(0x239), ByteOrder::AsDelivered);
        assert_eq!(order(0x500), ByteOrder::Swapped);
        assert_eq!(order(0x505), ByteOrder::Swapped);
        // Unmapped
        assert_eq!(order(0x111), ByteOrder::AsDelivered);

        for block in [Block::BlockStatus, Block::GeneratorSetter] {
            assert!(catalog
                .block_fields(block)
                .all(|f| f.byte_order == ByteOrder::Swapped));
        }
    }

    #[test]
    fn test_byte_order_apply() {
        assert_eq!(ByteOrder::AsDelivered.apply(0x0100), 0x0100);
        assert_eq!(ByteOrder::Swapped.apply(0x0100), 0x0001);
        assert_eq!(ByteOrder::Swapped.apply(ByteOrder::Swapped.apply(0x1234)), 0x1234);
    }

    #[test]
    fn test_block_from_str() {
        assert_eq!("sensors".parse::<Block>().unwrap(), Block::Sensors);
        assert_eq!(
            "Limits-And-Targets".parse::<Block>().unwrap(),
            Block::LimitsAndTargets
        );
        assert!("alarms".parse::<Block>().is_err());
    }

    #[test]
    fn test_from_fields_rejects_overlap() {
        let fields = vec![
            FieldDef::new(0x10, Block::Sensors, DecodeKind::UInt32, "a", "A"),
            FieldDef::new(0x11, Block::Sensors, DecodeKind::UInt16, "b", "B"),
        ];
        let err = RegisterCatalog::from_fields(fields).unwrap_err();
        assert!(matches!(err, CatalogError::Overlap { second: "b", .. }));
    }

    #[test]
    fn test_from_fields_rejects_duplicate_and_bad_bits() {
        let dup = vec![
            FieldDef::new(0x10, Block::Sensors, DecodeKind::UInt16, "a", "A"),
            FieldDef::new(0x11, Block::Sensors, DecodeKind::UInt16, "a", "A"),
        ];
        assert!(matches!(
            RegisterCatalog::from_fields(dup),
            Err(CatalogError::DuplicateName { name: "a" })
        ));

        const WIDE: &[BitDef] = &[BitDef::group(15, "wide", "Wide")];
        let bad = vec![FieldDef::new(0x10, Block::BlockStatus, DecodeKind::Bits(WIDE), "s", "S")];
        assert!(matches!(
            RegisterCatalog::from_fields(bad),
            Err(CatalogError::BitOutOfRange { bit: "wide", .. })
        ));
    }

    #[test]
    fn test_from_fields_sorts() {
        let fields = vec![
            FieldDef::new(0x20, Block::Sensors, DecodeKind::UInt16, "b", "B"),
            FieldDef::new(0x10, Block::Sensors, DecodeKind::UInt16, "a", "A"),
        ];
        let catalog = RegisterCatalog::from_fields(fields).unwrap();
        assert_eq!(catalog.fields()[0].name, "a");
    }
}
