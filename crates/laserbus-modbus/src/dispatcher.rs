// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-in-flight request queue and dispatcher.
//!
//! The dispatcher is a synchronous state machine owned by the engine's run
//! loop. It never performs I/O; it tells the engine what to send and when a
//! completion or timeout is still relevant.
//!
//! ```text
//!            tick (connected, queue non-empty)
//!   ┌──────┐ ───────────────────────────────▶ ┌─────────────────────────┐
//!   │ Idle │                                   │ Dispatching(batch, cur) │
//!   └──────┘ ◀─────────────────────────────── │   in_flight: seq|none   │
//!            batch exhausted / abandon()       └─────────────────────────┘
//! ```
//!
//! A batch is a snapshot of the queue order taken on the tick that starts it.
//! Entries are removed from the queue when they are sent, so a payload
//! overwritten before its turn goes out with the newest value and an address
//! re-enqueued after it was sent joins the next batch.

use std::collections::HashMap;
use std::time::Duration;

use laserbus_core::RegisterAddress;
use tokio::time::Instant;

use crate::types::{QueuedRequest, DEFAULT_TIMEOUT};

// =============================================================================
// RequestQueue
// =============================================================================

/// Address-keyed queue preserving first-enqueue order.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: HashMap<RegisterAddress, QueuedRequest>,
    order: Vec<RegisterAddress>,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `request`, replacing any request at the same address in place.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn enqueue(&mut self, request: QueuedRequest) -> bool {
        let address = request.address;
        let replaced = self.entries.insert(address, request).is_some();
        if !replaced {
            self.order.push(address);
        }
        replaced
    }

    /// Removes and returns the request at `address`.
    pub fn take(&mut self, address: RegisterAddress) -> Option<QueuedRequest> {
        let request = self.entries.remove(&address)?;
        if let Some(index) = self.order.iter().position(|a| *a == address) {
            self.order.remove(index);
        }
        Some(request)
    }

    /// Returns the request at `address`.
    pub fn get(&self, address: RegisterAddress) -> Option<&QueuedRequest> {
        self.entries.get(&address)
    }

    /// Returns queued addresses in dispatch order.
    pub fn addresses(&self) -> &[RegisterAddress] {
        &self.order
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every queued request and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.order.len();
        self.entries.clear();
        self.order.clear();
        count
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// The request currently awaiting a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Sequence number of the request.
    pub seq: u64,
    /// The request as sent.
    pub request: QueuedRequest,
    /// When the request times out.
    pub deadline: Instant,
}

/// Result of asking the dispatcher for the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send this request now.
    Send(InFlight),
    /// The batch is finished; the dispatcher is idle again.
    Exhausted,
    /// A request is still in flight.
    Busy,
    /// No batch is running.
    Idle,
}

#[derive(Debug)]
enum State {
    Idle,
    Dispatching {
        batch: Vec<RegisterAddress>,
        cursor: usize,
        in_flight: Option<InFlight>,
    },
}

/// What [`Dispatcher::abandon`] discarded.
#[derive(Debug, Default)]
pub struct Abandoned {
    /// The in-flight request, if any.
    pub in_flight: Option<InFlight>,
    /// Batch entries that were never sent.
    pub unsent: usize,
    /// Queued requests dropped, including unsent batch entries.
    pub dropped: usize,
}

/// Single-flight dispatcher over a [`RequestQueue`].
#[derive(Debug)]
pub struct Dispatcher {
    queue: RequestQueue,
    state: State,
    next_seq: u64,
    generation: u64,
    timeout: Duration,
}

impl Dispatcher {
    /// Creates an idle dispatcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            queue: RequestQueue::new(),
            state: State::Idle,
            next_seq: 1,
            generation: 0,
            timeout,
        }
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the per-request timeout for requests sent from now on.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Queues a request. Enqueuing while disconnected still queues.
    ///
    /// Returns `true` if an existing entry was overwritten.
    pub fn enqueue(&mut self, request: QueuedRequest) -> bool {
        self.queue.enqueue(request)
    }

    /// Returns the queue.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Returns `true` if no batch is running.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Returns the in-flight request.
    pub fn in_flight(&self) -> Option<&InFlight> {
        match &self.state {
            State::Dispatching { in_flight, .. } => in_flight.as_ref(),
            State::Idle => None,
        }
    }

    /// Returns the in-flight deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.in_flight().map(|f| f.deadline)
    }

    /// Identifies the current batch; deferred advances carry it so they
    /// cannot act on a later batch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Periodic tick. Starts a batch when idle, connected and work is queued.
    pub fn on_tick(&mut self, connected: bool, now: Instant) -> Step {
        if !self.is_idle() {
            return Step::Busy;
        }
        if !connected || self.queue.is_empty() {
            return Step::Idle;
        }

        self.generation += 1;
        self.state = State::Dispatching {
            batch: self.queue.addresses().to_vec(),
            cursor: 0,
            in_flight: None,
        };
        tracing::debug!(
            generation = self.generation,
            size = self.queue.len(),
            "Starting dispatch batch"
        );
        self.send_next(now)
    }

    /// Deferred continuation after a completion.
    ///
    /// Ignored unless `generation` matches the running batch and nothing is in
    /// flight.
    pub fn advance(&mut self, generation: u64, now: Instant) -> Step {
        if generation != self.generation {
            return Step::Idle;
        }
        match &self.state {
            State::Idle => Step::Idle,
            State::Dispatching {
                in_flight: Some(_), ..
            } => Step::Busy,
            State::Dispatching { in_flight: None, .. } => self.send_next(now),
        }
    }

    fn send_next(&mut self, now: Instant) -> Step {
        let State::Dispatching {
            batch,
            cursor,
            in_flight,
        } = &mut self.state
        else {
            return Step::Idle;
        };

        while let Some(address) = batch.get(*cursor).copied() {
            *cursor += 1;
            let Some(request) = self.queue.take(address) else {
                continue;
            };

            let seq = self.next_seq;
            self.next_seq += 1;
            let sent = InFlight {
                seq,
                request,
                deadline: now + self.timeout,
            };
            *in_flight = Some(sent.clone());
            return Step::Send(sent);
        }

        tracing::debug!(generation = self.generation, "Dispatch batch exhausted");
        self.state = State::Idle;
        Step::Exhausted
    }

    /// Accepts the completion of request `seq`.
    ///
    /// Returns the request if it was the one in flight. A stale sequence
    /// returns `None` and changes nothing.
    pub fn complete(&mut self, seq: u64) -> Option<QueuedRequest> {
        match &mut self.state {
            State::Dispatching { in_flight, .. }
                if in_flight.as_ref().is_some_and(|f| f.seq == seq) =>
            {
                in_flight.take().map(|f| f.request)
            }
            _ => None,
        }
    }

    /// Expires the in-flight request if its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<InFlight> {
        match &mut self.state {
            State::Dispatching { in_flight, .. }
                if in_flight.as_ref().is_some_and(|f| f.deadline <= now) =>
            {
                in_flight.take()
            }
            _ => None,
        }
    }

    /// Drops the batch, the in-flight tracking and the queue.
    pub fn abandon(&mut self) -> Abandoned {
        let previous = std::mem::replace(&mut self.state, State::Idle);
        self.generation += 1;

        let (in_flight, unsent) = match previous {
            State::Dispatching {
                batch,
                cursor,
                in_flight,
            } => (in_flight, batch.len().saturating_sub(cursor)),
            State::Idle => (None, 0),
        };

        Abandoned {
            in_flight,
            unsent,
            dropped: self.queue.clear(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(address: u16, count: u16) -> QueuedRequest {
        QueuedRequest::read(RegisterAddress::new(address), count, 1)
    }

    fn sent(step: Step) -> InFlight {
        match step {
            Step::Send(in_flight) => in_flight,
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn test_queue_overwrite_keeps_position() {
        let mut queue = RequestQueue::new();
        assert!(!queue.enqueue(read(0x100, 16)));
        assert!(!queue.enqueue(read(0x11E, 2)));
        assert!(queue.enqueue(read(0x100, 17)));

        assert_eq!(
            queue.addresses(),
            &[RegisterAddress::new(0x100), RegisterAddress::new(0x11E)]
        );
        assert_eq!(
            queue.get(RegisterAddress::new(0x100)).unwrap().spec,
            crate::types::RequestSpec::Read { count: 17 }
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_batch_sends_in_first_enqueue_order() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 16));
        dispatcher.enqueue(read(0x11E, 2));
        dispatcher.enqueue(read(0x200, 58));

        let first = sent(dispatcher.on_tick(true, now));
        assert_eq!(first.request.address, RegisterAddress::new(0x100));
        assert_eq!(first.deadline, now + Duration::from_millis(1000));

        assert!(dispatcher.complete(first.seq).is_some());
        let generation = dispatcher.generation();
        let second = sent(dispatcher.advance(generation, now));
        assert_eq!(second.request.address, RegisterAddress::new(0x11E));
        assert!(second.seq > first.seq);

        dispatcher.complete(second.seq);
        let third = sent(dispatcher.advance(generation, now));
        assert_eq!(third.request.address, RegisterAddress::new(0x200));

        dispatcher.complete(third.seq);
        assert_eq!(dispatcher.advance(generation, now), Step::Exhausted);
        assert!(dispatcher.is_idle());
        assert!(dispatcher.queue().is_empty());
    }

    #[test]
    fn test_single_flight() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        dispatcher.enqueue(read(0x101, 1));

        let first = sent(dispatcher.on_tick(true, now));
        let generation = dispatcher.generation();
        assert_eq!(dispatcher.advance(generation, now), Step::Busy);
        assert_eq!(dispatcher.on_tick(true, now), Step::Busy);
        assert_eq!(dispatcher.in_flight().unwrap().seq, first.seq);
    }

    #[test]
    fn test_tick_requires_connection_and_work() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        assert_eq!(dispatcher.on_tick(true, now), Step::Idle);

        dispatcher.enqueue(read(0x100, 1));
        assert_eq!(dispatcher.on_tick(false, now), Step::Idle);
        assert_eq!(dispatcher.queue().len(), 1);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        let first = sent(dispatcher.on_tick(true, now));

        assert!(dispatcher.complete(first.seq + 1).is_none());
        assert!(dispatcher.in_flight().is_some());

        dispatcher.abandon();
        assert!(dispatcher.complete(first.seq).is_none());
    }

    #[test]
    fn test_expire_respects_deadline() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::new(Duration::from_millis(500));
        dispatcher.enqueue(read(0x100, 1));
        dispatcher.enqueue(read(0x101, 1));
        let first = sent(dispatcher.on_tick(true, now));

        assert!(dispatcher.expire(now + Duration::from_millis(499)).is_none());
        let expired = dispatcher.expire(now + Duration::from_millis(500)).unwrap();
        assert_eq!(expired.seq, first.seq);

        // The reply that arrives after the timeout is stale.
        assert!(dispatcher.complete(first.seq).is_none());

        let generation = dispatcher.generation();
        let next = sent(dispatcher.advance(generation, now));
        assert_eq!(next.request.address, RegisterAddress::new(0x101));
    }

    #[test]
    fn test_overwrite_before_turn_sends_newest_payload() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        dispatcher.enqueue(QueuedRequest::write_single(RegisterAddress::new(0x000), 1, 1));
        let first = sent(dispatcher.on_tick(true, now));

        dispatcher.enqueue(QueuedRequest::write_single(RegisterAddress::new(0x000), 4, 1));
        dispatcher.complete(first.seq);
        let second = sent(dispatcher.advance(dispatcher.generation(), now));
        assert_eq!(
            second.request.spec,
            crate::types::RequestSpec::WriteSingle { value: 4 }
        );
    }

    #[test]
    fn test_reenqueue_after_send_joins_next_batch() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        let first = sent(dispatcher.on_tick(true, now));

        dispatcher.enqueue(read(0x100, 1));
        dispatcher.complete(first.seq);
        assert_eq!(
            dispatcher.advance(dispatcher.generation(), now),
            Step::Exhausted
        );
        assert_eq!(dispatcher.queue().len(), 1);

        let again = sent(dispatcher.on_tick(true, now));
        assert_eq!(again.request.address, RegisterAddress::new(0x100));
    }

    #[test]
    fn test_abandon_drops_everything() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        dispatcher.enqueue(read(0x101, 1));
        dispatcher.enqueue(read(0x102, 1));
        let first = sent(dispatcher.on_tick(true, now));
        let old_generation = dispatcher.generation();

        let abandoned = dispatcher.abandon();
        assert_eq!(abandoned.in_flight.unwrap().seq, first.seq);
        assert_eq!(abandoned.unsent, 2);
        assert_eq!(abandoned.dropped, 2);
        assert!(dispatcher.is_idle());
        assert!(dispatcher.queue().is_empty());
        assert_eq!(dispatcher.advance(old_generation, now), Step::Idle);
    }

    #[test]
    fn test_stale_advance_does_not_touch_new_batch() {
        let now = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.enqueue(read(0x100, 1));
        let first = sent(dispatcher.on_tick(true, now));
        dispatcher.complete(first.seq);
        let stale_generation = dispatcher.generation();

        dispatcher.abandon();
        dispatcher.enqueue(read(0x200, 2));
        dispatcher.enqueue(read(0x300, 2));
        let fresh = sent(dispatcher.on_tick(true, now));
        dispatcher.complete(fresh.seq);

        assert_eq!(dispatcher.advance(stale_generation, now), Step::Idle);
        assert!(dispatcher.in_flight().is_none());
        let next = sent(dispatcher.advance(dispatcher.generation(), now));
        assert_eq!(next.request.address, RegisterAddress::new(0x300));
    }
}
