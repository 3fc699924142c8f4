//! The connection controller
//!
//! One task owns everything that changes over a connection's life: the
//! current transport, the heartbeat and reconnect timers, the pending
//! outbound buffer and the subscriber registry. Nothing is shared, so
//! nothing is locked.
//!
//! ```text
//!  SocketClient ──Command──┐
//!                          ├──> [controller task] ──> Transport::send
//!  EventSink / Timer ─Signal┘          │
//!                                      ├──> watch<ConnectionState>
//!                                      └──> broadcast<ConnectionEvent>
//! ```
//!
//! Signals are drained before commands. A command that waits for a reply
//! therefore observes every transport event that was reported before it
//! was sent.
//!
//! The task ends once every [`SocketClient`](crate::SocketClient) and
//! [`Subscription`](crate::Subscription) has been dropped. It closes the
//! transport on the way out.

use crate::buffer::PendingBuffer;
use crate::config::ClientConfig;
use crate::connection_state::{ConnectionState, ReconnectPlan, ReconnectState};
use crate::heartbeat::Heartbeat;
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectionStrategy;
use crate::subscriber::{Subscriber, SubscriberId, SubscriberRegistry};
use crate::timer::{Scheduler, Signal, TimerId};
use crate::transport::{ConnectionId, EventSink, Transport, TransportEvent, TransportFactory};
use resock_core::{
    CloseInfo, Codec, Error, Frame, HeartbeatMessage, ReadyState, Result, PING_EVENT, PONG_EVENT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::Instrument;

/// Capacity of the lifecycle event channel; slow listeners lag beyond it
const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A transport was constructed and is handshaking
    Connecting { connection: ConnectionId },
    /// The handshake completed
    Opened { connection: ConnectionId },
    /// The connection closed, by the peer or by `close()`
    Closed { info: Option<CloseInfo> },
    /// The transport reported a failure
    Error { reason: String },
    /// The peer did not answer a ping in time
    HeartbeatTimeout,
    /// Attempt `attempt` is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// No further attempts will be made until `connect()` is called
    ReconnectExhausted { attempts: u32 },
}

/// Requests from the public handles
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<Result<()>>,
    },
    Close,
    Reconnect,
    Send(Frame),
    Subscribe {
        id: SubscriberId,
        subscriber: Subscriber,
    },
    Unsubscribe {
        id: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    ReadyState {
        reply: oneshot::Sender<Option<ReadyState>>,
    },
}

/// Everything the controller is built from
pub(crate) struct ControllerOptions {
    pub(crate) url: String,
    pub(crate) config: ClientConfig,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) strategy: Box<dyn ReconnectionStrategy>,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

/// What the handles keep of a spawned controller
pub(crate) struct ControllerHandle {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) state: watch::Receiver<ConnectionState>,
    pub(crate) events: broadcast::Sender<ConnectionEvent>,
}

/// Start the controller task on the current runtime
pub(crate) fn spawn(options: ControllerOptions) -> Result<ControllerHandle> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::Internal(format!("no Tokio runtime: {}", e)))?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

    let controller = Controller {
        heartbeat: Heartbeat::new(
            options.config.heartbeat_interval,
            options.config.heartbeat_timeout,
        ),
        pending: PendingBuffer::new(options.config.dedup_pending),
        url: options.url,
        config: options.config,
        factory: options.factory,
        codec: options.codec,
        strategy: options.strategy,
        metrics: options.metrics,
        scheduler: Scheduler::new(signal_tx),
        connection: None,
        last_connection: 0,
        state: ConnectionState::Idle,
        reconnect: ReconnectState::default(),
        subscribers: SubscriberRegistry::default(),
        state_tx,
        events_tx: events_tx.clone(),
    };

    let span = tracing::info_span!("controller", url = %controller.url);
    runtime.spawn(controller.run(command_rx, signal_rx).instrument(span));

    Ok(ControllerHandle {
        commands: command_tx,
        state: state_rx,
        events: events_tx,
    })
}

/// The live transport and the attempt it belongs to
struct Connection {
    id: ConnectionId,
    transport: Box<dyn Transport>,
}

struct Controller {
    url: String,
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    codec: Arc<dyn Codec>,
    strategy: Box<dyn ReconnectionStrategy>,
    metrics: Option<Arc<ClientMetrics>>,
    scheduler: Scheduler,
    connection: Option<Connection>,
    last_connection: u64,
    state: ConnectionState,
    heartbeat: Heartbeat,
    reconnect: ReconnectState,
    pending: PendingBuffer,
    subscribers: SubscriberRegistry,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(signal) = signals.recv() => self.handle_signal(signal),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        tracing::debug!("All handles dropped, shutting down");
        self.heartbeat.stop();
        self.reconnect.cancel();
        self.release_connection();
        self.set_state(ConnectionState::Closed);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let _ = reply.send(self.connect());
            }
            Command::Close => self.close(),
            Command::Reconnect => self.force_reconnect(),
            Command::Send(frame) => {
                if let Err(frame) = self.try_transmit(frame) {
                    self.buffer(frame);
                }
            }
            Command::Subscribe { id, subscriber } => {
                tracing::debug!(
                    subscriber = %id,
                    message_type = ?subscriber.message_type(),
                    "Subscriber added"
                );
                self.subscribers.insert(id, subscriber);
            }
            Command::Unsubscribe { id, reply } => {
                let removed = self.subscribers.remove(id);
                tracing::debug!(subscriber = %id, removed, "Unsubscribe");
                let _ = reply.send(removed);
            }
            Command::ReadyState { reply } => {
                let ready = self
                    .connection
                    .as_ref()
                    .map(|connection| connection.transport.ready_state());
                let _ = reply.send(ready);
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Transport { connection, event } => {
                if self.connection.as_ref().map(|c| c.id) != Some(connection) {
                    tracing::trace!(
                        connection = %connection,
                        ?event,
                        "Ignoring event from released transport"
                    );
                    return;
                }
                match event {
                    TransportEvent::Open => self.on_open(connection),
                    TransportEvent::Message(frame) => self.on_frame(frame),
                    TransportEvent::Error(reason) => self.on_error(connection, reason),
                    TransportEvent::Close(info) => self.on_close(connection, info),
                }
            }
            Signal::HeartbeatDue(id) => {
                if self.heartbeat.on_send_due(id, &mut self.scheduler) {
                    tracing::trace!("Sending ping");
                    self.send_heartbeat(HeartbeatMessage::ping());
                }
            }
            Signal::HeartbeatExpired(id) => self.on_heartbeat_expired(id),
            Signal::ReconnectDue(id) => {
                if !self.reconnect.release(id) {
                    return;
                }
                tracing::info!(attempt = self.reconnect.attempts(), "Reconnect attempt starting");
                if let Err(e) = self.open_connection() {
                    tracing::debug!(error = %e, "Reconnect attempt could not start");
                }
            }
        }
    }

    fn connect(&mut self) -> Result<()> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            tracing::debug!(state = ?self.state, "Already connecting or connected");
            return Ok(());
        }
        if self.reconnect.cancel() {
            tracing::debug!("Pending reconnect superseded by connect()");
        }
        self.open_connection()
    }

    /// Construct a transport for a new attempt
    fn open_connection(&mut self) -> Result<()> {
        self.release_connection();

        self.last_connection += 1;
        let id = ConnectionId(self.last_connection);
        let sink = EventSink::new(id, self.scheduler.signals());

        match self.factory.open(&self.url, sink) {
            Ok(transport) => {
                tracing::debug!(connection = %id, "Transport constructed");
                self.connection = Some(Connection { id, transport });
                self.set_state(ConnectionState::Connecting);
                self.emit(ConnectionEvent::Connecting { connection: id });
                Ok(())
            }
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "Failed to construct transport");
                if let Some(ref m) = self.metrics {
                    m.record_error("construction");
                }
                self.emit(ConnectionEvent::Error {
                    reason: e.to_string(),
                });
                self.set_state(ConnectionState::Idle);
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        tracing::info!("Closing connection");
        self.heartbeat.stop();
        self.reconnect.cancel();
        self.pending.clear();
        self.subscribers.clear();
        let had_connection = self.release_connection();
        self.set_state(ConnectionState::Closed);
        if had_connection {
            self.emit(ConnectionEvent::Closed { info: None });
        }
    }

    fn force_reconnect(&mut self) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Closed => {
                tracing::debug!(state = ?self.state, "Nothing to reconnect");
            }
            _ => {
                tracing::info!("Reconnect requested");
                self.connection_lost();
            }
        }
    }

    fn on_open(&mut self, connection: ConnectionId) {
        if self.state == ConnectionState::Open {
            return;
        }

        let reconnected = self.reconnect.attempts() > 0;
        self.reconnect.reset(self.strategy.as_mut());
        self.set_state(ConnectionState::Open);
        tracing::info!(connection = %connection, reconnected, "Connection opened");
        if reconnected {
            if let Some(ref m) = self.metrics {
                m.record_reconnection_success();
            }
        }

        if self.config.heartbeat_enabled {
            self.heartbeat.arm(&mut self.scheduler);
        }
        self.flush();
        self.emit(ConnectionEvent::Opened { connection });
    }

    fn on_frame(&mut self, frame: Frame) {
        let message = self.codec.decode(frame);
        if let Some(ref m) = self.metrics {
            m.record_message(message.event().unwrap_or("raw"));
        }

        match message.event() {
            Some(PING_EVENT) => {
                tracing::trace!("Ping received, answering");
                self.send_heartbeat(HeartbeatMessage::pong());
            }
            Some(PONG_EVENT) => {
                if self.config.heartbeat_enabled && self.state == ConnectionState::Open {
                    if !self.heartbeat.awaiting_pong() {
                        tracing::trace!("Unsolicited pong");
                    }
                    self.heartbeat.on_pong(&mut self.scheduler);
                }
            }
            event => {
                let delivered = self.subscribers.dispatch(&message);
                tracing::trace!(event = ?event, delivered, "Message dispatched");
            }
        }
    }

    fn on_error(&mut self, connection: ConnectionId, reason: String) {
        tracing::warn!(connection = %connection, error = %reason, "Transport error");
        if let Some(ref m) = self.metrics {
            m.record_error("transport");
        }
        self.emit(ConnectionEvent::Error { reason });
        self.connection_lost();
    }

    fn on_close(&mut self, connection: ConnectionId, info: Option<CloseInfo>) {
        tracing::info!(
            connection = %connection,
            code = info.as_ref().map(|i| i.code),
            "Connection closed by peer"
        );
        self.emit(ConnectionEvent::Closed { info });
        self.connection_lost();
    }

    fn on_heartbeat_expired(&mut self, id: TimerId) {
        if !self.heartbeat.on_ack_expired(id) {
            return;
        }
        tracing::warn!(
            timeout_ms = self.config.heartbeat_timeout.as_millis() as u64,
            "No pong received, connection presumed dead"
        );
        if let Some(ref m) = self.metrics {
            m.record_heartbeat_timeout();
        }
        self.emit(ConnectionEvent::HeartbeatTimeout);
        self.connection_lost();
    }

    /// Drop the transport and go through the reconnect path
    fn connection_lost(&mut self) {
        if self.heartbeat.is_armed() {
            tracing::trace!("Stopping heartbeat");
        }
        self.heartbeat.stop();
        self.release_connection();
        self.set_state(ConnectionState::Reconnecting);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self
            .reconnect
            .schedule(self.strategy.as_mut(), &mut self.scheduler)
        {
            ReconnectPlan::AlreadyPending => {
                tracing::debug!("Reconnect already pending");
            }
            ReconnectPlan::Exhausted { attempts } => {
                tracing::warn!(attempts, "Reconnection attempts exhausted");
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_exhausted();
                }
                self.emit(ConnectionEvent::ReconnectExhausted { attempts });
            }
            ReconnectPlan::Scheduled { attempt, delay } => {
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_attempt();
                }
                self.emit(ConnectionEvent::Reconnecting { attempt, delay });
            }
        }
    }

    /// Close and forget the current transport
    ///
    /// Its sink is now stale, so anything it still reports is ignored.
    fn release_connection(&mut self) -> bool {
        match self.connection.take() {
            Some(connection) => {
                tracing::debug!(connection = %connection.id, "Releasing transport");
                connection.transport.close();
                true
            }
            None => false,
        }
    }

    /// Hand a frame to the open transport, or give it back
    fn try_transmit(&self, frame: Frame) -> std::result::Result<(), Frame> {
        if self.state != ConnectionState::Open {
            return Err(frame);
        }
        let Some(connection) = self.connection.as_ref() else {
            return Err(frame);
        };
        if connection.transport.ready_state() != ReadyState::Open {
            return Err(frame);
        }

        match connection.transport.send(frame.clone()) {
            Ok(()) => {
                if let Some(ref m) = self.metrics {
                    m.record_frame_sent();
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(connection = %connection.id, error = %e, "Transport refused frame");
                if let Some(ref m) = self.metrics {
                    m.record_error("send");
                }
                Err(frame)
            }
        }
    }

    fn buffer(&mut self, frame: Frame) {
        let len = frame.len();
        if self.pending.push(frame) {
            tracing::trace!(bytes = len, pending = self.pending.len(), "Frame buffered");
            if let Some(ref m) = self.metrics {
                m.record_frame_buffered();
            }
        } else {
            tracing::trace!(bytes = len, "Identical frame already pending");
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let frames = self.pending.drain();
        tracing::debug!(count = frames.len(), "Flushing pending frames");
        for frame in frames {
            if let Err(frame) = self.try_transmit(frame) {
                self.buffer(frame);
            }
        }
    }

    /// Heartbeat frames are never buffered
    fn send_heartbeat(&mut self, message: HeartbeatMessage) {
        let frame = serde_json::to_value(&message)
            .ok()
            .and_then(|value| self.codec.encode(value).into_frame());
        match frame {
            Some(frame) => {
                if self.try_transmit(frame).is_err() {
                    tracing::debug!(
                        event = %message.event,
                        "Heartbeat frame dropped, connection not open"
                    );
                }
            }
            None => {
                tracing::warn!(event = %message.event, "Heartbeat could not be encoded");
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?state, "State change");
        self.state = state;
        self.state_tx.send_replace(state);
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state);
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // No listeners is fine
        let _ = self.events_tx.send(event);
    }
}
