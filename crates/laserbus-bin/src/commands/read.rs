// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use laserbus_core::DecodePipeline;
use laserbus_modbus::EngineEvent;

use super::{load_config, print_outcome};
use crate::cli::{Cli, OutputFormat, ReadArgs};
use crate::error::{BinError, BinResult};
use crate::session::Session;

/// Executes the `read` command.
pub async fn read(cli: &Cli, args: ReadArgs) -> BinResult<()> {
    let config = load_config(cli)?;
    let mut session = Session::start(&config)?;

    let result = async {
        session.connect().await?;
        session
            .handle()
            .read_holding_registers(args.address, args.count)?;
        session.await_completion(args.address).await
    }
    .await;
    session.close().await;

    let block = match result? {
        EngineEvent::ReadCompleted(block) => block,
        other => {
            return Err(BinError::runtime(format!(
                "Unexpected event for read: {}",
                other.name()
            )))
        }
    };

    if !args.raw {
        return print_outcome(args.format, &block, &DecodePipeline::standard().decode(&block));
    }

    match args.format {
        OutputFormat::Text => {
            for (i, value) in block.registers().iter().enumerate() {
                let address = block
                    .start()
                    .offset(i as u16)
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "overflow".to_string());
                println!("{address}  0x{value:04X}  {value}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "start": block.start(),
                "registers": block.registers(),
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}
