// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write`, `mode` and `switch` commands.

use laserbus_core::{RegisterAddress, MODE_CONTROL_ADDRESS};
use laserbus_modbus::{EngineEvent, EngineHandle, ModbusResult};

use super::load_config;
use crate::cli::{Cli, ModeArgs, SwitchArgs, WriteArgs};
use crate::error::{BinError, BinResult};
use crate::session::Session;

/// Executes the `write` command.
///
/// One value goes out as a single register write, several values or a float
/// as a multiple register write. Plain values are written untouched; a float
/// is encoded in the catalog byte order of `address`.
pub async fn write(cli: &Cli, args: WriteArgs) -> BinResult<()> {
    let address = args.address;
    let count = write_one(cli, address, |handle| match (args.float, args.values.as_slice()) {
        (Some(value), _) => handle.write_float32(address, value),
        (None, [value]) => handle.write_single_register(address, *value),
        (None, values) => handle.write_multiple_registers(address, values.to_vec()),
    })
    .await?;

    println!("Wrote {count} register(s) at {address}");
    Ok(())
}

/// Executes the `mode` command.
pub async fn mode(cli: &Cli, args: ModeArgs) -> BinResult<()> {
    write_one(cli, MODE_CONTROL_ADDRESS, |handle| handle.write_mode(args.mode)).await?;
    println!("Mode set to {}", args.mode.as_str());
    Ok(())
}

/// Executes the `switch` command.
pub async fn switch(cli: &Cli, args: SwitchArgs) -> BinResult<()> {
    let address = args.target.address();
    write_one(cli, address, |handle| handle.write_switch(address, args.state)).await?;
    println!("Switch at {address} set to {:?}", args.state);
    Ok(())
}

/// Connects, queues one write through `queue` and waits for its completion.
async fn write_one<F>(cli: &Cli, address: RegisterAddress, queue: F) -> BinResult<u16>
where
    F: FnOnce(&EngineHandle) -> ModbusResult<()>,
{
    let config = load_config(cli)?;
    let mut session = Session::start(&config)?;

    let result = async {
        session.connect().await?;
        queue(session.handle())?;
        session.await_completion(address).await
    }
    .await;
    session.close().await;

    match result? {
        EngineEvent::WriteCompleted { count, .. } => Ok(count),
        other => Err(BinError::runtime(format!(
            "Unexpected event for write: {}",
            other.name()
        ))),
    }
}
