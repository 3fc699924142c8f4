//! The public client handle
//!
//! `SocketClient` is a thin handle onto the controller task. Every method
//! posts a command and returns; nothing blocks on the network.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: `SocketClient::new(url)` or [`ClientBuilder`]
//! 2. **Connect**: `connect()` constructs the transport; the handshake
//!    completes in the background
//! 3. **Use**: `send()` / `send_message()` at any time (frames are buffered
//!    while offline), `subscribe()` for inbound messages
//! 4. **Recover**: lost connections are retried with exponential backoff
//! 5. **Close**: `close()` ends the session; drop every handle to stop the task
//!
//! # Cloning
//!
//! `SocketClient` is cheaply cloneable. All clones drive the same
//! connection.

use crate::client_builder::ClientBuilder;
use crate::connection_state::ConnectionState;
use crate::controller::{Command, ConnectionEvent, ControllerHandle};
use crate::subscriber::{Subscriber, SubscriberId, Subscription};
use resock_core::{Codec, Encoded, Error, Frame, ReadyState, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Self-healing WebSocket client
#[derive(Clone)]
pub struct SocketClient {
    url: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    codec: Arc<dyn Codec>,
    next_subscriber: Arc<AtomicU64>,
}

impl SocketClient {
    /// Create a client for `url` with the default configuration
    ///
    /// Does not connect; call [`connect`](Self::connect). Must be called
    /// from within a Tokio runtime.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(url).build()
    }

    /// Start configuring a client for `url`
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub(crate) fn from_parts(
        url: String,
        handle: ControllerHandle,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            url: url.into(),
            commands: handle.commands,
            state: handle.state,
            events: handle.events,
            codec,
            next_subscriber: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The endpoint this client connects to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the connection
    ///
    /// Returns once the transport is constructed, not once it is open; watch
    /// [`state_changes`](Self::state_changes) for that. A no-op while
    /// connecting or connected. Cancels a pending reconnect and tries
    /// immediately otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] if no transport can be built for the URL. This
    /// is not retried.
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn connect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect { reply })?;
        rx.await.map_err(|_| Error::ControllerStopped)?
    }

    /// Close the connection and end the session
    ///
    /// Cancels pending timers, discards buffered frames and removes every
    /// subscriber. No reconnect follows.
    pub fn close(&self) {
        if self.command(Command::Close).is_err() {
            tracing::debug!("close() after controller shutdown");
        }
    }

    /// Drop the current connection and go through the reconnect path
    pub fn reconnect(&self) {
        if self.command(Command::Reconnect).is_err() {
            tracing::debug!("reconnect() after controller shutdown");
        }
    }

    /// Send a raw frame, or buffer it until the connection opens
    pub fn send(&self, frame: impl Into<Frame>) -> Result<()> {
        self.command(Command::Send(frame.into()))
    }

    /// Encode a structured value with the client's codec and send it
    ///
    /// A value that cannot be encoded is dropped with a warning; this is not
    /// an error.
    pub fn send_message<T: Serialize>(&self, message: T) -> Result<()> {
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping message that cannot be represented as JSON");
                return Ok(());
            }
        };

        match self.codec.encode(value) {
            Encoded::Frame(frame) => self.send(frame),
            Encoded::Passthrough(value) => {
                tracing::warn!(value = %value, "Dropping message the codec could not encode");
                Ok(())
            }
        }
    }

    /// Register a subscriber for inbound messages
    pub fn subscribe(&self, subscriber: Subscriber) -> Subscription {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed) + 1);
        if self
            .command(Command::Subscribe { id, subscriber })
            .is_err()
        {
            tracing::debug!(subscriber = %id, "subscribe() after controller shutdown");
        }
        Subscription::new(id, self.commands.clone())
    }

    /// Remove a subscriber by id
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.command(Command::Unsubscribe { id, reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Readiness of the current transport, `None` without one
    pub async fn ready_state(&self) -> Result<Option<ReadyState>> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::ReadyState { reply })?;
        rx.await.map_err(|_| Error::ControllerStopped)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the connection is open
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Receiver notified on every state change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Receiver for lifecycle events from now on
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ControllerStopped)
    }
}

impl std::fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClient")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
