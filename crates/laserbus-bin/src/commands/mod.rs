// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `poll`: poll register blocks until Ctrl+C
//! - `read`: read holding registers once
//! - `write`, `mode`, `switch`: control writes
//! - `decode`: decode a hex capture offline
//! - `catalog`: list the register map
//! - `validate`: validate configuration file
//! - `version`: show version information

mod catalog;
mod control;
mod decode;
mod poll;
mod read;
mod validate;
mod version;

pub use catalog::catalog;
pub use control::{mode, switch, write};
pub use decode::decode;
pub use poll::poll;
pub use read::read;
pub use validate::validate;
pub use version::version;

use laserbus_config::{ConfigLoader, LaserbusConfig};
use laserbus_core::{DecodeOutcome, RawRegisterBlock};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Poll(args) => poll::poll(&cli, args).await,
        Commands::Read(args) => read::read(&cli, args).await,
        Commands::Write(args) => control::write(&cli, args).await,
        Commands::Mode(args) => control::mode(&cli, args).await,
        Commands::Switch(args) => control::switch(&cli, args).await,
        Commands::Decode(args) => decode::decode(&cli, args),
        Commands::Catalog(args) => catalog::catalog(&cli, args),
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration and applies `--host`/`--port`.
pub fn load_config(cli: &Cli) -> BinResult<LaserbusConfig> {
    let mut config = ConfigLoader::new().load_or_default(cli.config.as_deref())?;

    if let Some(host) = &cli.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    config.validate()?;

    Ok(config)
}

/// Prints the decoded readings of one block.
///
/// Fields cut off by the end of the block are reported on stderr.
pub(crate) fn print_outcome(
    format: OutputFormat,
    block: &RawRegisterBlock,
    outcome: &DecodeOutcome,
) -> BinResult<()> {
    match format {
        OutputFormat::Text => {
            for reading in &outcome.readings {
                println!("{reading}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "timestamp": chrono::Utc::now(),
                "start": block.start(),
                "registers": block.len(),
                "readings": outcome.readings,
                "skipped": outcome.skipped,
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    for error in &outcome.errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}
