// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The client engine run loop and its handle.
//!
//! One task owns the connection manager, the dispatcher and the transport
//! handle. It reacts to five sources:
//!
//! ```text
//!   EngineHandle ──commands (mpsc)──┐
//!   request task ──completions──────┤
//!   deferred advance ───────────────┼──▶ run loop ──▶ EventBus
//!   in-flight deadline ─────────────┤
//!   dispatch tick (while connected) ┘
//! ```
//!
//! Request I/O runs in a spawned task so the loop keeps serving commands and
//! the deadline while a request is pending. On timeout or disconnect the task
//! is aborted; a completion that was already queued carries a stale sequence
//! number and is dropped by the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use laserbus_core::{
    encode_float32_as, encode_u16, Block, Mode, RawRegisterBlock, RegisterAddress,
    RegisterCatalog, SwitchState, DEFAULT_UNIT_ID, MODE_CONTROL_ADDRESS,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::client::RegisterTransport;
use crate::connection::{ConnectionManager, Transition};
use crate::dispatcher::{Dispatcher, InFlight, Step};
use crate::error::{ModbusError, ModbusResult};
use crate::events::{BusStats, EngineEvent, EventBus, EventSubscriber, Fault};
use crate::types::{
    Completion, ConnectionConfig, ConnectionState, QueuedRequest, RequestSpec,
    DEFAULT_EVENT_CAPACITY, DEFAULT_TICK_INTERVAL, DEFAULT_TIMEOUT,
};

// =============================================================================
// EngineConfig
// =============================================================================

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Dispatch tick interval.
    pub tick_interval: Duration,
    /// Per-request timeout until the first successful connect sets one.
    pub default_timeout: Duration,
    /// Event bus capacity per subscriber.
    pub event_capacity: usize,
    /// Unit id used by handle methods that do not take one.
    pub unit_id: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_timeout: DEFAULT_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            unit_id: DEFAULT_UNIT_ID,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

enum Command {
    Connect {
        config: ConnectionConfig,
        reply: Option<oneshot::Sender<ModbusResult<()>>>,
    },
    Disconnect {
        reply: Option<oneshot::Sender<()>>,
    },
    Enqueue(QueuedRequest),
    Shutdown,
}

struct CompletionMsg {
    seq: u64,
    result: ModbusResult<Completion>,
}

// =============================================================================
// Engine
// =============================================================================

/// The engine run loop. Create one with [`Engine::spawn`].
pub struct Engine {
    connection: ConnectionManager,
    dispatcher: Dispatcher,
    events: EventBus,
    tick_interval: Duration,
    ticker: Option<Interval>,
    request_task: Option<JoinHandle<()>>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<CompletionMsg>,
    completions_rx: mpsc::UnboundedReceiver<CompletionMsg>,
    deferred_tx: mpsc::UnboundedSender<u64>,
    deferred_rx: mpsc::UnboundedReceiver<u64>,
}

impl Engine {
    /// Spawns the run loop on the current tokio runtime.
    ///
    /// The loop ends when [`EngineHandle::shutdown`] is called or every handle
    /// is dropped.
    pub fn spawn(
        transport: Arc<dyn RegisterTransport>,
        config: EngineConfig,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();

        let connection = ConnectionManager::new(transport);
        let events = EventBus::new(config.event_capacity);

        let handle = EngineHandle {
            commands: commands_tx,
            events: events.clone(),
            state: connection.watch(),
            unit_id: config.unit_id,
        };

        let engine = Self {
            connection,
            dispatcher: Dispatcher::new(config.default_timeout),
            events,
            tick_interval: config.tick_interval.max(Duration::from_millis(1)),
            ticker: None,
            request_task: None,
            commands,
            completions_tx,
            completions_rx,
            deferred_tx,
            deferred_rx,
        };

        (handle, tokio::spawn(engine.run()))
    }

    async fn run(mut self) {
        tracing::debug!(
            transport = %self.connection.transport().display_name(),
            tick_ms = self.tick_interval.as_millis() as u64,
            "Engine started"
        );

        loop {
            let deadline = self.dispatcher.deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(msg) = self.completions_rx.recv() => self.handle_completion(msg).await,
                Some(generation) = self.deferred_rx.recv() => self.handle_advance(generation),
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_timeout();
                }
                _ = next_tick(&mut self.ticker), if self.ticker.is_some() => self.handle_tick(),
            }
        }

        self.disconnect_now().await;
        tracing::debug!("Engine stopped");
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { config, reply } => {
                let result = self.connect(config).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Disconnect { reply } => {
                self.disconnect_now().await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            Command::Enqueue(request) => {
                let replaced = self.dispatcher.enqueue(request.clone());
                tracing::trace!(request = %request, replaced, "Request queued");
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    async fn connect(&mut self, config: ConnectionConfig) -> ModbusResult<()> {
        let timeout = config.timeout;

        match self.connection.connect(config).await {
            Ok(Transition::Up) => {
                self.dispatcher.set_timeout(timeout);
                self.start_ticker();
                self.publish(EngineEvent::ConnectionStateChanged { connected: true });
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(error) => {
                self.report(&error, None, "connect");
                Err(error)
            }
        }
    }

    async fn handle_completion(&mut self, msg: CompletionMsg) {
        let Some(request) = self.dispatcher.complete(msg.seq) else {
            tracing::debug!(seq = msg.seq, "Ignoring stale completion");
            return;
        };
        self.request_task = None;

        match msg.result {
            Ok(Completion::Read(block)) => {
                tracing::debug!(seq = msg.seq, start = %block.start(), registers = block.len(), "Read completed");
                self.publish(EngineEvent::ReadCompleted(block));
            }
            Ok(Completion::Write { start, count }) => {
                tracing::debug!(seq = msg.seq, start = %start, count, "Write completed");
                self.publish(EngineEvent::WriteCompleted { start, count });
            }
            Err(error) => {
                self.report(&error, Some(request.address), request.spec.operation());
                if error.is_connection_lost() {
                    self.disconnect_now().await;
                    return;
                }
            }
        }

        self.schedule_advance();
    }

    fn handle_advance(&mut self, generation: u64) {
        if let Step::Send(in_flight) = self.dispatcher.advance(generation, Instant::now()) {
            self.send(in_flight);
        }
    }

    fn handle_timeout(&mut self) {
        let Some(expired) = self.dispatcher.expire(Instant::now()) else {
            return;
        };
        if let Some(task) = self.request_task.take() {
            task.abort();
        }

        let error = ModbusError::timeout(expired.request.address, self.dispatcher.timeout());
        self.report(&error, Some(expired.request.address), "dispatch");
        self.schedule_advance();
    }

    fn handle_tick(&mut self) {
        let connected = self.connection.is_connected();
        if let Step::Send(in_flight) = self.dispatcher.on_tick(connected, Instant::now()) {
            self.send(in_flight);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn send(&mut self, in_flight: InFlight) {
        let InFlight { seq, request, .. } = in_flight;
        tracing::debug!(seq, request = %request, "Dispatching request");

        let transport = self.connection.transport().clone();
        let completions = self.completions_tx.clone();
        self.request_task = Some(tokio::spawn(async move {
            let result = perform(transport.as_ref(), &request).await;
            let _ = completions.send(CompletionMsg { seq, result });
        }));
    }

    fn schedule_advance(&self) {
        let _ = self.deferred_tx.send(self.dispatcher.generation());
    }

    async fn disconnect_now(&mut self) {
        self.ticker = None;
        if let Some(task) = self.request_task.take() {
            task.abort();
        }

        let abandoned = self.dispatcher.abandon();
        if abandoned.in_flight.is_some() || abandoned.dropped > 0 {
            tracing::debug!(
                in_flight = abandoned.in_flight.as_ref().map(|f| f.seq),
                unsent = abandoned.unsent,
                dropped = abandoned.dropped,
                "Abandoned pending requests"
            );
        }

        if self.connection.disconnect().await == Transition::Down {
            self.publish(EngineEvent::ConnectionStateChanged { connected: false });
        }
    }

    fn start_ticker(&mut self) {
        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn report(&self, error: &ModbusError, address: Option<RegisterAddress>, context: &str) {
        error.log(context);
        self.publish(EngineEvent::ErrorOccurred(Fault::from_error(error, address)));
    }

    fn publish(&self, event: EngineEvent) {
        tracing::trace!(event = event.name(), "Publishing event");
        self.events.publish(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn perform(
    transport: &dyn RegisterTransport,
    request: &QueuedRequest,
) -> ModbusResult<Completion> {
    let start = request.address;
    let address = start.value();

    match &request.spec {
        RequestSpec::Read { count } => transport
            .read_holding_registers(request.unit_id, address, *count)
            .await
            .map(|registers| Completion::Read(RawRegisterBlock::new(start, registers))),
        RequestSpec::WriteSingle { value } => transport
            .write_single_register(request.unit_id, address, *value)
            .await
            .map(|()| Completion::Write { start, count: 1 }),
        RequestSpec::WriteMultiple { values } => transport
            .write_multiple_registers(request.unit_id, address, values)
            .await
            .map(|()| Completion::Write {
                start,
                count: request.spec.register_count(),
            }),
    }
}

// =============================================================================
// EngineHandle
// =============================================================================

/// Cheap, cloneable front end of a running engine.
///
/// Request methods only queue work; results arrive as events. They fail with
/// [`ModbusError::ConnectionUnavailable`] only when the engine has stopped.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: EventBus,
    state: watch::Receiver<ConnectionState>,
    unit_id: u8,
}

impl EngineHandle {
    fn send(&self, command: Command) -> ModbusResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ModbusError::ConnectionUnavailable)
    }

    /// Returns a handle that addresses requests to `unit_id`.
    pub fn with_unit_id(&self, unit_id: u8) -> Self {
        Self {
            unit_id,
            ..self.clone()
        }
    }

    /// Returns the unit id used by request methods.
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Starts connecting with the default 1000 ms timeout.
    pub fn connect(&self, host: impl Into<String>, port: u16) -> ModbusResult<()> {
        self.connect_with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    /// Starts connecting. The timeout also becomes the per-request timeout.
    pub fn connect_with_timeout(
        &self,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> ModbusResult<()> {
        let config = ConnectionConfig::new(host)
            .with_port(port)
            .with_timeout(timeout);
        self.send(Command::Connect {
            config,
            reply: None,
        })
    }

    /// Connects and waits for the outcome.
    pub async fn connect_and_wait(&self, config: ConnectionConfig) -> ModbusResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.send(Command::Connect {
            config,
            reply: Some(reply),
        })?;
        outcome
            .await
            .map_err(|_| ModbusError::ConnectionUnavailable)?
    }

    /// Starts disconnecting.
    pub fn disconnect(&self) -> ModbusResult<()> {
        self.send(Command::Disconnect { reply: None })
    }

    /// Disconnects and waits until the engine is idle.
    pub async fn disconnect_and_wait(&self) -> ModbusResult<()> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Disconnect { reply: Some(reply) })?;
        done.await.map_err(|_| ModbusError::ConnectionUnavailable)
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the connection state satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> ModbusResult<ConnectionState>
    where
        F: FnMut(ConnectionState) -> bool,
    {
        let mut state = self.state.clone();
        let current = state
            .wait_for(|s| predicate(*s))
            .await
            .map_err(|_| ModbusError::ConnectionUnavailable)?;
        Ok(*current)
    }

    /// Returns `true` until the engine task has stopped.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stops the engine after disconnecting.
    pub fn shutdown(&self) -> ModbusResult<()> {
        self.send(Command::Shutdown)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queues an arbitrary request.
    pub fn enqueue(&self, request: QueuedRequest) -> ModbusResult<()> {
        self.send(Command::Enqueue(request))
    }

    /// Queues a read of `count` holding registers at `start`.
    pub fn read_holding_registers(&self, start: RegisterAddress, count: u16) -> ModbusResult<()> {
        self.enqueue(QueuedRequest::read(start, count, self.unit_id))
    }

    /// Queues a single register write.
    pub fn write_single_register(&self, address: RegisterAddress, value: u16) -> ModbusResult<()> {
        self.enqueue(QueuedRequest::write_single(address, value, self.unit_id))
    }

    /// Queues a multiple register write.
    pub fn write_multiple_registers(
        &self,
        start: RegisterAddress,
        values: Vec<u16>,
    ) -> ModbusResult<()> {
        self.enqueue(QueuedRequest::write_multiple(start, values, self.unit_id))
    }

    /// Queues every read span of `block`.
    pub fn read_block(&self, block: Block) -> ModbusResult<()> {
        for span in block.read_spans() {
            self.read_holding_registers(span.start, span.count)?;
        }
        Ok(())
    }

    /// Queues a write of the operating mode.
    pub fn write_mode(&self, mode: Mode) -> ModbusResult<()> {
        self.write_u16(MODE_CONTROL_ADDRESS, mode.register_value())
    }

    /// Queues a write of a generator setter switch.
    pub fn write_switch(&self, address: RegisterAddress, state: SwitchState) -> ModbusResult<()> {
        self.write_u16(address, state.register_value())
    }

    /// Queues a write of a 16-bit field in the register's catalog byte order.
    pub fn write_u16(&self, address: RegisterAddress, value: u16) -> ModbusResult<()> {
        let order = RegisterCatalog::standard().byte_order(address);
        self.write_single_register(address, encode_u16(value, order))
    }

    /// Queues a write of a float32 field, low word first, in the field's
    /// catalog byte order.
    pub fn write_float32(&self, address: RegisterAddress, value: f32) -> ModbusResult<()> {
        let order = RegisterCatalog::standard().byte_order(address);
        self.write_multiple_registers(address, encode_float32_as(value, order).to_vec())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to engine events published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Returns event bus statistics.
    pub fn event_stats(&self) -> BusStats {
        self.events.stats()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.state())
            .field("unit_id", &self.unit_id)
            .field("running", &self.is_running())
            .finish()
    }
}
