// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine session used by the device commands.
//!
//! A session owns one engine over the TCP transport, the reconnect policy
//! from the configuration and a subscription to the engine events. Commands
//! queue requests through [`Session::handle`] and wait for the matching
//! completion with [`Session::await_completion`].

use std::sync::Arc;
use std::time::Duration;

use laserbus_config::{LaserbusConfig, ReconnectSection};
use laserbus_core::RegisterAddress;
use laserbus_modbus::{
    BusError, ConnectionConfig, Engine, EngineConfig, EngineEvent, EngineHandle, EventSubscriber,
    ExponentialBackoff, ReconnectPolicy, RetryResult, TcpTransport,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BinError, BinResult};

/// Extra wait on top of the request timeout before a command gives up.
const REPLY_GRACE: Duration = Duration::from_secs(1);

/// Builds the reconnect policy from its configuration section.
pub fn reconnect_policy(section: &ReconnectSection) -> ReconnectPolicy {
    let backoff = ExponentialBackoff::new(section.initial_delay(), section.max_delay())
        .with_jitter(section.jitter);
    ReconnectPolicy::new(section.max_attempts, backoff)
}

/// Builds the connection settings, failing without a host.
pub fn connection_config(config: &LaserbusConfig) -> BinResult<ConnectionConfig> {
    let host = config.require_host()?;
    Ok(ConnectionConfig::new(host)
        .with_port(config.connection.port)
        .with_timeout(config.connection.timeout())
        .with_unit_id(config.connection.unit_id))
}

/// A running engine plus its event subscription.
pub struct Session {
    handle: EngineHandle,
    task: JoinHandle<()>,
    events: EventSubscriber,
    connection: ConnectionConfig,
    policy: ReconnectPolicy,
    reply_timeout: Duration,
}

impl Session {
    /// Spawns an engine for `config`. Does not connect.
    pub fn start(config: &LaserbusConfig) -> BinResult<Self> {
        let connection = connection_config(config)?;
        let engine_config = EngineConfig {
            tick_interval: config.dispatcher.tick_interval(),
            default_timeout: connection.timeout,
            event_capacity: config.dispatcher.event_capacity,
            unit_id: connection.unit_id,
        };
        let reply_timeout = connection.timeout + engine_config.tick_interval * 2 + REPLY_GRACE;

        let (handle, task) = Engine::spawn(Arc::new(TcpTransport::new()), engine_config);
        let events = handle.subscribe();

        Ok(Self {
            handle,
            task,
            events,
            connection,
            policy: reconnect_policy(&config.reconnect),
            reply_timeout,
        })
    }

    /// Returns the engine handle.
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Returns the event subscription.
    pub fn events(&mut self) -> &mut EventSubscriber {
        &mut self.events
    }

    /// Returns the target connection settings.
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Connects through the reconnect policy.
    pub async fn connect(&self) -> BinResult<()> {
        let target = self.connection.socket_addr();
        let result = self
            .policy
            .run(|attempt| {
                let handle = self.handle.clone();
                let config = self.connection.clone();
                debug!(attempt, target_addr = %config.socket_addr(), "Connect attempt");
                async move { handle.connect_and_wait(config).await }
            })
            .await;

        match result {
            RetryResult::Success(()) => {
                info!(target_addr = %target, "Connected");
                Ok(())
            }
            RetryResult::Failed {
                error, attempts, ..
            } => Err(BinError::from(error).with_context(format!(
                "Connecting to {target} failed after {attempts} attempt(s)"
            ))),
        }
    }

    /// Waits for the completion or failure of the request at `address`.
    ///
    /// Returns the `ReadCompleted` or `WriteCompleted` event. A fault for the
    /// address, a disconnect or no answer within the request timeout is an
    /// error.
    pub async fn await_completion(&mut self, address: RegisterAddress) -> BinResult<EngineEvent> {
        let reply_timeout = self.reply_timeout;
        let events = &mut self.events;

        let wait = async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(BusError::Closed) => return Err(BinError::runtime("Engine stopped")),
                };

                let completed = match &event {
                    EngineEvent::ReadCompleted(block) => block.start() == address,
                    EngineEvent::WriteCompleted { start, .. } => *start == address,
                    _ => false,
                };
                if completed {
                    return Ok(event);
                }

                match event {
                    EngineEvent::ErrorOccurred(fault) if fault.address == Some(address) => {
                        return Err(BinError::device(fault.to_string()));
                    }
                    EngineEvent::ConnectionStateChanged { connected: false } => {
                        return Err(BinError::connection("Connection lost"));
                    }
                    _ => {}
                }
            }
        };

        tokio::time::timeout(reply_timeout, wait)
            .await
            .map_err(|_| {
                BinError::device(format!(
                    "No completion for {address} within {} ms",
                    reply_timeout.as_millis()
                ))
            })?
    }

    /// Disconnects and stops the engine.
    pub async fn close(self) {
        let _ = self.handle.disconnect_and_wait().await;
        let stats = self.handle.event_stats();
        debug!(
            published = stats.events_published,
            unobserved = stats.events_unobserved,
            dropped = stats.events_dropped,
            "Event bus summary"
        );
        if stats.events_dropped > 0 {
            warn!(
                dropped = stats.events_dropped,
                "Events were lost; raise dispatcher.event_capacity"
            );
        }
        let _ = self.handle.shutdown();
        if let Err(e) = self.task.await {
            debug!(error = %e, "Engine task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_requires_host() {
        let config = LaserbusConfig::default();
        assert!(matches!(
            connection_config(&config),
            Err(BinError::Config(_))
        ));
    }

    #[test]
    fn test_connection_config_from_sections() {
        let mut config = LaserbusConfig::default();
        config.connection.host = "10.0.0.2".to_string();
        config.connection.port = 1502;
        config.connection.timeout_ms = 300;
        config.connection.unit_id = 4;

        let connection = connection_config(&config).unwrap();
        assert_eq!(connection.socket_addr(), "10.0.0.2:1502");
        assert_eq!(connection.timeout, Duration::from_millis(300));
        assert_eq!(connection.unit_id, 4);
    }

    #[test]
    fn test_reconnect_policy_from_section() {
        let section = ReconnectSection {
            max_attempts: 3,
            ..ReconnectSection::default()
        };
        let policy = reconnect_policy(&section);
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }
}
