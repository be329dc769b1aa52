// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `poll`: poll register blocks until Ctrl+C
//! - `read`, `write`, `mode`, `switch`: single-shot device operations
//! - `decode`: decode a hex capture offline
//! - `catalog`: list the register map
//! - `validate`: validate the configuration file
//! - `version`: show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use laserbus_core::{
    Block, Mode, RegisterAddress, SwitchState, CURRENT_PULSES_SWITCH,
    THERMAL_STABILIZATION_SWITCH,
};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// laserbus - Modbus TCP client for the laser subsystem controller
#[derive(Parser, Debug)]
#[command(
    name = "laserbus",
    author = "Sylvex <contact@sylvex.io>",
    version = laserbus_core::VERSION,
    about = "Modbus TCP client for the laser subsystem controller",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long, env = "LASERBUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device host, overrides the configuration file
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Device port, overrides the configuration file
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the laserbus CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll register blocks and print decoded readings
    ///
    /// Reconnects with backoff when the connection drops. Stops on Ctrl+C.
    Poll(PollArgs),

    /// Read holding registers once
    Read(ReadArgs),

    /// Write one or more holding registers
    Write(WriteArgs),

    /// Set the operating mode
    Mode(ModeArgs),

    /// Switch a generator setter output on or off
    Switch(SwitchArgs),

    /// Decode a raw register capture without a device
    ///
    /// The capture is the hex dump of the register bytes as they appear on
    /// the wire, big-endian per register.
    Decode(DecodeArgs),

    /// List the register map
    Catalog(CatalogArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `poll` command.
#[derive(Args, Debug, Default, Clone)]
pub struct PollArgs {
    /// Seconds between poll rounds, overrides the configuration file
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Blocks to poll, overrides the configuration file
    #[arg(short, long, value_delimiter = ',')]
    pub blocks: Vec<Block>,

    /// Poll a single round and exit
    #[arg(long)]
    pub once: bool,

    /// Output format for readings
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Start address (decimal or 0x-prefixed hex)
    pub address: RegisterAddress,

    /// Number of registers
    #[arg(short = 'n', long, default_value = "1")]
    pub count: u16,

    /// Print raw registers instead of decoded readings
    #[arg(long)]
    pub raw: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Start address (decimal or 0x-prefixed hex)
    pub address: RegisterAddress,

    /// Register values as sent on the wire (decimal or 0x-prefixed hex)
    #[arg(required_unless_present = "float", value_parser = parse_register_value)]
    pub values: Vec<u16>,

    /// Write a float32 as two registers, low word first, in the register's byte order
    #[arg(long, conflicts_with = "values", allow_negative_numbers = true)]
    pub float: Option<f32>,
}

/// Arguments for the `mode` command.
#[derive(Args, Debug, Clone)]
pub struct ModeArgs {
    /// Operating mode (auto, manual, duty, prepare, work)
    pub mode: Mode,
}

/// Arguments for the `switch` command.
#[derive(Args, Debug, Clone)]
pub struct SwitchArgs {
    /// Which switch to set
    pub target: SwitchTarget,

    /// New state (on or off)
    pub state: SwitchState,
}

/// Arguments for the `decode` command.
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Address of the first register in the capture
    pub start: RegisterAddress,

    /// Hex capture, whitespace and `:`/`-` separators allowed
    pub hex: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `catalog` command.
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Only list fields of this block
    #[arg(short, long)]
    pub block: Option<Block>,

    /// Include bit definitions
    #[arg(long)]
    pub bits: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<laserbus_config::LogFormat> for LogFormat {
    fn from(format: laserbus_config::LogFormat) -> Self {
        match format {
            laserbus_config::LogFormat::Text => LogFormat::Text,
            laserbus_config::LogFormat::Json => LogFormat::Json,
            laserbus_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Generator setter switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SwitchTarget {
    /// Thermal stabilization
    ThermalStabilization,
    /// Current pulses
    CurrentPulses,
}

impl SwitchTarget {
    /// Returns the register of the switch.
    pub fn address(self) -> RegisterAddress {
        match self {
            SwitchTarget::ThermalStabilization => THERMAL_STABILIZATION_SWITCH,
            SwitchTarget::CurrentPulses => CURRENT_PULSES_SWITCH,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

/// Parses a register value in decimal or 0x-prefixed hex.
pub fn parse_register_value(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("invalid register value '{s}' (expected 0-65535 or 0x0000-0xFFFF)"))
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Get the effective log level, falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_command() {
        let cli = Cli::parse_from(["laserbus", "poll", "-b", "sensors,block-status", "--once"]);
        if let Commands::Poll(args) = cli.command {
            assert_eq!(args.blocks, vec![Block::Sensors, Block::BlockStatus]);
            assert!(args.once);
            assert_eq!(args.interval, None);
        } else {
            panic!("Expected Poll command");
        }
    }

    #[test]
    fn test_read_command_parses_hex_address() {
        let cli = Cli::parse_from(["laserbus", "read", "0x11E", "-n", "2"]);
        if let Commands::Read(args) = cli.command {
            assert_eq!(args.address, RegisterAddress::new(0x11E));
            assert_eq!(args.count, 2);
            assert!(!args.raw);
        } else {
            panic!("Expected Read command");
        }
    }

    #[test]
    fn test_write_command_values() {
        let cli = Cli::parse_from(["laserbus", "write", "0x500", "1", "0x00FF"]);
        if let Commands::Write(args) = cli.command {
            assert_eq!(args.address, THERMAL_STABILIZATION_SWITCH);
            assert_eq!(args.values, vec![1, 0xFF]);
            assert_eq!(args.float, None);
        } else {
            panic!("Expected Write command");
        }
    }

    #[test]
    fn test_write_command_float() {
        let cli = Cli::parse_from(["laserbus", "write", "0x502", "--float", "-12.5"]);
        if let Commands::Write(args) = cli.command {
            assert_eq!(args.float, Some(-12.5));
            assert!(args.values.is_empty());
        } else {
            panic!("Expected Write command");
        }
    }

    #[test]
    fn test_mode_and_switch_commands() {
        let cli = Cli::parse_from(["laserbus", "mode", "prepare"]);
        assert!(matches!(cli.command, Commands::Mode(ModeArgs { mode: Mode::Prepare })));

        let cli = Cli::parse_from(["laserbus", "switch", "current-pulses", "on"]);
        if let Commands::Switch(args) = cli.command {
            assert_eq!(args.target.address(), CURRENT_PULSES_SWITCH);
            assert_eq!(args.state, SwitchState::On);
        } else {
            panic!("Expected Switch command");
        }
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::parse_from([
            "laserbus", "catalog", "-H", "10.0.0.7", "-p", "1502", "-c", "/etc/laserbus.yaml",
        ]);
        assert_eq!(cli.host.as_deref(), Some("10.0.0.7"));
        assert_eq!(cli.port, Some(1502));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/laserbus.yaml")));
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = Cli::parse_from(["laserbus", "version"]);
        assert_eq!(cli.effective_log_level("info"), "info");

        let cli = Cli::parse_from(["laserbus", "version", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("info"), "trace");

        let cli = Cli::parse_from(["laserbus", "version", "-q"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["laserbus", "version", "-v"]);
        assert!(cli.is_verbose());
        assert_eq!(cli.effective_log_level("info"), "debug");
    }

    #[test]
    fn test_parse_register_value() {
        assert_eq!(parse_register_value("42"), Ok(42));
        assert_eq!(parse_register_value("0xFFFF"), Ok(0xFFFF));
        assert!(parse_register_value("65536").is_err());
        assert!(parse_register_value("0xZZ").is_err());
    }
}
