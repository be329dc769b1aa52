// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine events and the broadcast bus that carries them.
//!
//! ```text
//!   Engine run loop ──publish──▶ EventBus (broadcast) ──▶ subscriber 1
//!                                                    ├──▶ subscriber 2
//!                                                    └──▶ ...
//! ```
//!
//! Subscribers that fall behind lose the oldest events; the loss is logged and
//! counted, and receiving continues.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use laserbus_core::{RawRegisterBlock, RegisterAddress};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::error::{ErrorKind, ModbusError};

// =============================================================================
// Events
// =============================================================================

/// A failure reported on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Taxonomy kind.
    pub kind: ErrorKind,
    /// Descriptive message.
    pub message: String,
    /// Start address of the request involved, if any.
    pub address: Option<RegisterAddress>,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

impl Fault {
    /// Builds a fault from an engine error.
    pub fn from_error(error: &ModbusError, address: Option<RegisterAddress>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            address,
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Events published by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fired on every Connected/Disconnected edge.
    ConnectionStateChanged {
        /// New state.
        connected: bool,
    },
    /// A request or connect attempt failed.
    ErrorOccurred(Fault),
    /// A read returned registers.
    ReadCompleted(RawRegisterBlock),
    /// A write was acknowledged.
    WriteCompleted {
        /// First register written.
        start: RegisterAddress,
        /// Number of registers written.
        count: u16,
    },
}

impl EngineEvent {
    /// Returns the event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
            Self::ErrorOccurred(_) => "error_occurred",
            Self::ReadCompleted(_) => "read_completed",
            Self::WriteCompleted { .. } => "write_completed",
        }
    }

    /// Returns the register address the event refers to, if any.
    pub fn address(&self) -> Option<RegisterAddress> {
        match self {
            Self::ConnectionStateChanged { .. } => None,
            Self::ErrorOccurred(fault) => fault.address,
            Self::ReadCompleted(block) => Some(block.start()),
            Self::WriteCompleted { start, .. } => Some(*start),
        }
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Error returned by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// The engine dropped the bus.
    #[error("Event bus closed")]
    Closed,
}

/// Statistics for the event bus.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BusStats {
    /// Events published.
    pub events_published: u64,
    /// Events published while nobody was subscribed.
    pub events_unobserved: u64,
    /// Events lost by lagging subscribers.
    pub events_dropped: u64,
    /// Current number of subscribers.
    pub subscriber_count: u64,
}

#[derive(Debug, Default)]
struct AtomicBusStats {
    events_published: AtomicU64,
    events_unobserved: AtomicU64,
    events_dropped: AtomicU64,
}

/// Broadcast bus for engine events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
    capacity: usize,
    stats: Arc<AtomicBusStats>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            capacity: capacity.max(1),
            stats: Arc::new(AtomicBusStats::default()),
        }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers reached, `0` if there are none.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                self.stats.events_unobserved.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Creates a new subscriber. It sees events published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            stats: self.stats.clone(),
        }
    }

    /// Returns the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns current statistics.
    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.stats.events_published.load(Ordering::Relaxed),
            events_unobserved: self.stats.events_unobserved.load(Ordering::Relaxed),
            events_dropped: self.stats.events_dropped.load(Ordering::Relaxed),
            subscriber_count: self.subscriber_count() as u64,
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A subscriber to the event bus.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EngineEvent>,
    stats: Arc<AtomicBusStats>,
}

impl EventSubscriber {
    /// Receives the next event, skipping over lag.
    pub async fn recv(&mut self) -> Result<EngineEvent, BusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.stats.events_dropped.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(count, "Event subscriber lagged, events dropped");
                }
            }
        }
    }

    /// Receives events until one satisfies `predicate`.
    pub async fn recv_matching<F>(&mut self, mut predicate: F) -> Result<EngineEvent, BusError>
    where
        F: FnMut(&EngineEvent) -> bool,
    {
        loop {
            let event = self.recv().await?;
            if predicate(&event) {
                return Ok(event);
            }
        }
    }

    /// Tries to receive an event without blocking.
    pub fn try_recv(&mut self) -> Result<Option<EngineEvent>, BusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.stats.events_dropped.fetch_add(count, Ordering::Relaxed);
                }
            }
        }
    }
}

impl fmt::Debug for EventSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscriber").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(connected: bool) -> EngineEvent {
        EngineEvent::ConnectionStateChanged { connected }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(connected(true)), 0);
        let stats = bus.stats();
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_unobserved, 1);
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.publish(connected(true)), 2);

        assert_eq!(a.recv().await.unwrap(), connected(true));
        assert_eq!(b.recv().await.unwrap(), connected(true));
        assert_eq!(a.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for start in 0..5u16 {
            bus.publish(EngineEvent::WriteCompleted {
                start: RegisterAddress::new(start),
                count: 1,
            });
        }

        let event = sub.recv().await.unwrap();
        assert_eq!(event.address(), Some(RegisterAddress::new(3)));
        assert_eq!(bus.stats().events_dropped, 3);
    }

    #[tokio::test]
    async fn test_recv_matching_and_close() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        bus.publish(connected(true));
        bus.publish(EngineEvent::WriteCompleted {
            start: RegisterAddress::new(0x000),
            count: 1,
        });

        let event = sub
            .recv_matching(|e| matches!(e, EngineEvent::WriteCompleted { .. }))
            .await
            .unwrap();
        assert_eq!(event.name(), "write_completed");

        drop(bus);
        assert_eq!(sub.recv().await, Err(BusError::Closed));
    }

    #[test]
    fn test_fault_from_error() {
        let error = ModbusError::timeout(RegisterAddress::new(0x100), std::time::Duration::from_secs(1));
        let fault = Fault::from_error(&error, Some(RegisterAddress::new(0x100)));
        assert_eq!(fault.kind, ErrorKind::Timeout);
        assert_eq!(fault.to_string(), "[timeout] Request timeout at 0x100 after 1000 ms");
    }
}
