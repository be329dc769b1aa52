// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Register captures, configuration documents and engine setup shared by the
//! integration suites.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use laserbus_core::{encode_float32, split_words, RawRegisterBlock, RegisterAddress};
use laserbus_modbus::{
    ConnectionConfig, Engine, EngineConfig, EngineEvent, EngineHandle, EventSubscriber,
    RegisterTransport,
};

/// Upper bound for waiting on a single event.
pub const EVENT_WAIT: Duration = Duration::from_secs(30);

// =============================================================================
// Engine Fixtures
// =============================================================================

/// Engine setup helpers.
pub struct EngineFixtures;

impl EngineFixtures {
    /// Per-request timeout used by the fixtures.
    pub const TIMEOUT: Duration = Duration::from_millis(1000);

    /// Connection settings for a local device.
    pub fn connection() -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1")
            .with_port(502)
            .with_timeout(Self::TIMEOUT)
    }

    /// Spawns an engine over `transport` without connecting.
    pub fn spawn<T: RegisterTransport>(
        transport: &Arc<T>,
    ) -> (EngineHandle, EventSubscriber, JoinHandle<()>) {
        let (handle, task) = Engine::spawn(transport.clone(), EngineConfig::default());
        let events = handle.subscribe();
        (handle, events, task)
    }

    /// Spawns an engine, connects it and consumes the connected event.
    pub async fn connected<T: RegisterTransport>(
        transport: &Arc<T>,
    ) -> (EngineHandle, EventSubscriber, JoinHandle<()>) {
        let (handle, mut events, task) = Self::spawn(transport);
        handle
            .connect_and_wait(Self::connection())
            .await
            .expect("connect failed");
        assert_eq!(
            next_event(&mut events).await,
            EngineEvent::ConnectionStateChanged { connected: true }
        );
        (handle, events, task)
    }
}

/// Receives the next event, failing the test if none arrives.
pub async fn next_event(events: &mut EventSubscriber) -> EngineEvent {
    tokio::time::timeout(EVENT_WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
}

/// Receives the next `n` events.
pub async fn next_events(events: &mut EventSubscriber, n: usize) -> Vec<EngineEvent> {
    let mut received = Vec::with_capacity(n);
    for _ in 0..n {
        received.push(next_event(events).await);
    }
    received
}

/// Lets the engine run for `duration` and asserts that it published nothing.
pub async fn assert_quiet(events: &mut EventSubscriber, duration: Duration) {
    tokio::time::sleep(duration).await;
    let event = events.try_recv().expect("event bus closed");
    assert!(event.is_none(), "unexpected event: {event:?}");
}

// =============================================================================
// Register Fixtures
// =============================================================================

/// Register captures in host order.
pub struct RegisterFixtures;

impl RegisterFixtures {
    /// Seventeen sensor registers, `board_operating_mode` = 4 (work).
    pub fn sensors() -> RawRegisterBlock {
        let mut registers: Vec<u16> = (0..17).map(|i| 200 + i).collect();
        registers[0] = 4;
        registers[16] = 12_345;
        RawRegisterBlock::new(RegisterAddress::new(0x100), registers)
    }

    /// Laser control board status with `heater_on`, `signal_good` and
    /// `laser_work_mode` = 1.
    pub fn laser_board_status() -> RawRegisterBlock {
        let value = 1u32 | (1 << 25) | (1 << 27);
        let words = split_words(value).map(u16::swap_bytes);
        RawRegisterBlock::new(RegisterAddress::new(0x11E), words.to_vec())
    }

    /// The limits block with each float set to its index plus one half.
    pub fn limits() -> RawRegisterBlock {
        let registers = (0..29)
            .flat_map(|i| encode_float32(i as f32 + 0.5))
            .collect();
        RawRegisterBlock::new(RegisterAddress::new(0x200), registers)
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML configuration.
    pub const YAML: &'static str = r#"
connection:
  host: 192.168.10.20
  port: 1502
  timeout_ms: 750
  unit_id: 3
dispatcher:
  tick_interval_ms: 50
  event_capacity: 256
poll:
  interval_secs: 2
  blocks: [sensors, block_status]
reconnect:
  max_attempts: 3
  initial_delay_ms: 200
  max_delay_ms: 2000
  jitter: 0.0
logging:
  level: debug
  format: json
"#;

    /// The same settings as TOML.
    pub const TOML: &'static str = r#"
[connection]
host = "192.168.10.20"
port = 1502
timeout_ms = 750
unit_id = 3

[dispatcher]
tick_interval_ms = 50
event_capacity = 256

[poll]
interval_secs = 2
blocks = ["sensors", "block_status"]

[reconnect]
max_attempts = 3
initial_delay_ms = 200
max_delay_ms = 2000
jitter = 0.0

[logging]
level = "debug"
format = "json"
"#;

    /// A minimal JSON configuration.
    pub const JSON: &'static str = r#"{
  "connection": { "host": "10.1.1.1" },
  "poll": { "blocks": ["generator_setter"] }
}"#;
}
