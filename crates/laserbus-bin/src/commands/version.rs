// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("laserbus - Modbus TCP client for the laser subsystem controller");
    println!();
    println!("Version Information:");
    println!("  laserbus-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  laserbus-core:   {}", laserbus_core::VERSION);
    println!("  laserbus-modbus: {}", laserbus_modbus::VERSION);
    println!("  laserbus-config: {}", laserbus_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Register map:   {} fields", laserbus_core::RegisterCatalog::standard().len());
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
