// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `decode` command.
//!
//! Decodes a capture of raw register bytes without a device. Useful for
//! checking the word order of float and status fields against real traffic.

use laserbus_core::{DecodePipeline, RawRegisterBlock};

use super::print_outcome;
use crate::cli::{Cli, DecodeArgs};
use crate::error::{BinError, BinResult};

/// Executes the `decode` command.
pub fn decode(_cli: &Cli, args: DecodeArgs) -> BinResult<()> {
    let block = RawRegisterBlock::from_hex(args.start, &args.hex)?;
    if block.is_empty() {
        return Err(BinError::decode("Capture contains no registers"));
    }

    let outcome = DecodePipeline::standard().decode(&block);
    print_outcome(args.format, &block, &outcome)?;

    if outcome.readings.is_empty() {
        return Err(BinError::decode(format!(
            "No field of the register map starts inside {} register(s) at {}",
            block.len(),
            block.start()
        )));
    }
    Ok(())
}
