// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.
//!
//! Every interval the read spans of the selected blocks are queued again; the
//! engine's address-keyed queue collapses rounds that pile up behind a slow
//! device. Each `ReadCompleted` is decoded and printed as it arrives.

use std::time::Duration;

use laserbus_core::{Block, DecodePipeline};
use laserbus_modbus::EngineEvent;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use super::{load_config, print_outcome};
use crate::cli::{Cli, PollArgs};
use crate::error::{BinError, BinResult};
use crate::session::Session;

/// Executes the `poll` command.
pub async fn poll(cli: &Cli, args: PollArgs) -> BinResult<()> {
    let config = load_config(cli)?;
    let blocks = if args.blocks.is_empty() {
        config.poll.blocks()?
    } else {
        args.blocks.clone()
    };
    let interval = match args.interval {
        Some(0) => return Err(BinError::config("--interval must be at least 1 second")),
        Some(secs) => Duration::from_secs(secs),
        None => config.poll.interval(),
    };

    let mut session = Session::start(&config)?;
    session.connect().await?;
    info!(
        blocks = ?blocks.iter().map(|b| b.name()).collect::<Vec<_>>(),
        interval_secs = interval.as_secs(),
        "Polling"
    );

    let result = run(&mut session, &blocks, interval, &args).await;
    session.close().await;
    result
}

async fn run(
    session: &mut Session,
    blocks: &[Block],
    interval: Duration,
    args: &PollArgs,
) -> BinResult<()> {
    let pipeline = DecodePipeline::standard();
    let spans_per_round: usize = blocks.iter().map(|b| b.read_spans().len()).sum();
    let mut outstanding = 0usize;
    let mut rounds = 0u64;

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!(rounds, "Interrupted, stopping");
                return Ok(());
            }

            _ = ticker.tick(), if !(args.once && rounds > 0) => {
                if !session.handle().is_connected() {
                    warn!("Not connected, reconnecting");
                    tokio::select! {
                        result = session.connect() => result?,
                        _ = &mut ctrl_c => return Ok(()),
                    }
                }
                for block in blocks {
                    session.handle().read_block(*block)?;
                }
                rounds += 1;
                outstanding = spans_per_round;
            }

            event = session.events().recv() => {
                let event = event.map_err(|_| BinError::runtime("Engine stopped"))?;
                match event {
                    EngineEvent::ReadCompleted(block) => {
                        print_outcome(args.format, &block, &pipeline.decode(&block))?;
                        outstanding = outstanding.saturating_sub(1);
                    }
                    EngineEvent::ErrorOccurred(fault) => {
                        warn!(kind = %fault.kind, address = ?fault.address, "{}", fault.message);
                        if fault.address.is_some() {
                            outstanding = outstanding.saturating_sub(1);
                        }
                    }
                    EngineEvent::ConnectionStateChanged { connected: false } => {
                        if args.once {
                            return Err(BinError::connection("Connection lost during poll"));
                        }
                        warn!("Connection lost, reconnecting next round");
                        outstanding = 0;
                    }
                    EngineEvent::ConnectionStateChanged { connected: true }
                    | EngineEvent::WriteCompleted { .. } => {}
                }

                if args.once && rounds > 0 && outstanding == 0 {
                    return Ok(());
                }
            }
        }
    }
}
