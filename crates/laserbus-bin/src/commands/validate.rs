// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use super::load_config;
use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let source = match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(BinError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            path.display().to_string()
        }
        None => "(defaults)".to_string(),
    };

    let config = load_config(cli)
        .map_err(|e| e.with_context("Configuration validation failed"))?;
    let blocks = config.poll.blocks()?;

    let mut warnings: Vec<String> = Vec::new();
    if config.connection.host.trim().is_empty() {
        warnings.push("No host configured; device commands need --host".to_string());
    }
    if config.connection.timeout_ms < config.dispatcher.tick_interval_ms {
        warnings.push(format!(
            "Request timeout ({} ms) is shorter than the dispatch tick ({} ms)",
            config.connection.timeout_ms, config.dispatcher.tick_interval_ms
        ));
    }

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {source}");
            println!();
            println!("Summary:");
            println!("  Target:     {}:{}", config.connection.host, config.connection.port);
            println!("  Unit ID:    {}", config.connection.unit_id);
            println!("  Timeout:    {} ms", config.connection.timeout_ms);
            println!("  Tick:       {} ms", config.dispatcher.tick_interval_ms);
            println!("  Poll:       every {} s", config.poll.interval_secs);
            println!(
                "  Blocks:     {}",
                blocks.iter().map(|b| b.name()).collect::<Vec<_>>().join(", ")
            );
            if cli.is_verbose() {
                for block in &blocks {
                    for span in block.read_spans() {
                        println!("    {:<18} {} x{}", block.name(), span.start, span.count);
                    }
                }
            }
            println!(
                "  Reconnect:  {} attempt(s)",
                match config.reconnect.max_attempts {
                    0 => "unlimited".to_string(),
                    n => n.to_string(),
                }
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {warning}");
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "source": source,
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
