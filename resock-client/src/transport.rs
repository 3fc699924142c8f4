//! Transport abstraction
//!
//! The controller never touches a socket directly. It asks a
//! [`TransportFactory`] for a [`Transport`] once per connection attempt and
//! hands it an [`EventSink`] bound to that attempt. The transport reports
//! `open`, `message`, `error` and `close` through the sink and accepts
//! outgoing frames through [`Transport::send`].
//!
//! Because every sink is tagged with its attempt's [`ConnectionId`], events
//! from a transport the controller already released are recognised as stale
//! and dropped.
//!
//! The default factory is [`WebSocketFactory`](crate::WebSocketFactory).
//! Custom factories make it possible to run the controller over anything
//! frame-oriented, and are how the test-suite drives it.

use crate::timer::Signal;
use resock_core::{CloseInfo, Frame, ReadyState, Result};
use tokio::sync::mpsc::UnboundedSender;

/// Identity of one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle events a transport reports
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The handshake completed; frames can flow
    Open,
    /// A frame arrived
    Message(Frame),
    /// The transport failed
    Error(String),
    /// The transport closed, with the peer's close frame if there was one
    Close(Option<CloseInfo>),
}

/// Event hook a transport reports into
///
/// One sink is registered per connection attempt.
#[derive(Debug, Clone)]
pub struct EventSink {
    connection: ConnectionId,
    signals: UnboundedSender<Signal>,
}

impl EventSink {
    pub(crate) fn new(connection: ConnectionId, signals: UnboundedSender<Signal>) -> Self {
        Self {
            connection,
            signals,
        }
    }

    /// The attempt this sink belongs to
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Report an event to the controller
    ///
    /// Returns `false` once the controller has shut down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.signals
            .send(Signal::Transport {
                connection: self.connection,
                event,
            })
            .is_ok()
    }

    /// Report a completed handshake
    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    /// Report an inbound frame
    pub fn message(&self, frame: Frame) -> bool {
        self.emit(TransportEvent::Message(frame))
    }

    /// Report a transport failure
    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(reason.into()))
    }

    /// Report that the transport closed
    pub fn close(&self, info: Option<CloseInfo>) -> bool {
        self.emit(TransportEvent::Close(info))
    }
}

/// One physical connection
///
/// Dropping the transport must release the underlying socket.
pub trait Transport: Send {
    /// Queue a frame for transmission
    fn send(&self, frame: Frame) -> Result<()>;

    /// Start closing the connection
    fn close(&self);

    /// Current readiness of the socket
    fn ready_state(&self) -> ReadyState;
}

/// Opens physical connections
pub trait TransportFactory: Send + Sync + 'static {
    /// Construct a transport for `url` reporting into `events`
    ///
    /// Must return quickly: the handshake itself happens in the background
    /// and is reported through the sink. An `Err` here means the transport
    /// could not even be constructed (for instance a malformed URL) and is
    /// returned to the caller of `connect()` without any retry.
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn Transport>>;
}
