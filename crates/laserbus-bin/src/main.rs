// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! laserbus - Modbus TCP client for the laser subsystem controller.

use laserbus_bin::cli::Cli;
use laserbus_bin::commands;
use laserbus_bin::error::report_error_and_exit;
use laserbus_bin::logging::init_logging;
use laserbus_config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // Logging defaults come from the config file when it loads; the command
    // reports a broken file itself.
    let logging = ConfigLoader::new()
        .load_or_default(cli.config.as_deref())
        .map(|config| config.logging)
        .unwrap_or_default();
    let level = cli.effective_log_level(logging.level.as_str()).to_string();
    let format = cli.log_format.unwrap_or_else(|| logging.format.into());
    init_logging(&level, format);

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
