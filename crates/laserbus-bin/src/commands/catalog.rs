// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `catalog` command.

use laserbus_core::{FieldDef, RegisterCatalog};

use crate::cli::{CatalogArgs, Cli, OutputFormat};
use crate::error::BinResult;

/// Executes the `catalog` command.
pub fn catalog(_cli: &Cli, args: CatalogArgs) -> BinResult<()> {
    let catalog = RegisterCatalog::standard();
    let fields: Vec<&FieldDef> = catalog
        .iter()
        .filter(|field| args.block.map_or(true, |block| field.block == block))
        .collect();

    match args.format {
        OutputFormat::Text => {
            println!(
                "{:<7} {:<5} {:<13} {:<13} {:<38} LABEL",
                "ADDRESS", "REGS", "KIND", "BYTES", "NAME"
            );
            for field in &fields {
                println!(
                    "{:<7} {:<5} {:<13} {:<13} {:<38} {}",
                    field.address.to_string(),
                    field.width(),
                    field.kind.name(),
                    field.byte_order.name(),
                    field.name,
                    field.label
                );
                if args.bits {
                    for bit in field.kind.bit_defs() {
                        let position = if bit.width > 1 {
                            format!("{}-{}", bit.position, bit.position + bit.width - 1)
                        } else {
                            bit.position.to_string()
                        };
                        println!("{:>14} {:<5} {:<38} {}", "bit", position, bit.name, bit.label);
                    }
                }
            }
            println!();
            println!("{} field(s)", fields.len());
        }
        OutputFormat::Json => {
            let output: Vec<_> = fields
                .iter()
                .map(|field| {
                    serde_json::json!({
                        "address": field.address,
                        "registers": field.width(),
                        "block": field.block,
                        "kind": field.kind.name(),
                        "byte_order": field.byte_order,
                        "name": field.name,
                        "label": field.label,
                        "bits": if args.bits { Some(field.kind.bit_defs()) } else { None },
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
