//! Common test utilities for resock-client integration tests
//!
//! Two ways to drive a client without a real server:
//!
//! - [`MockTransportFactory`]: an in-memory transport. Tests decide when a
//!   connection opens, what it receives and when it fails, and inspect what
//!   was sent. Combined with a paused Tokio clock this makes every timer
//!   deterministic.
//! - [`MockWsServer`]: a real WebSocket server on localhost for end-to-end
//!   checks of the default transport.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use resock_client::{
    ClientBuilder, ClientConfig, ConnectionEvent, EventSink, SocketClient, Transport,
    TransportFactory,
};
use resock_core::{CloseInfo, Error, Frame, ReadyState, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// Shared state of one mock connection
struct MockShared {
    url: String,
    sink: EventSink,
    ready: Mutex<ReadyState>,
    sent: Mutex<Vec<Frame>>,
    refuse_sends: AtomicBool,
    closed_by_client: AtomicBool,
}

/// Transport factory recording every connection it opens
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    connections: Arc<Mutex<Vec<Arc<MockShared>>>>,
    reject: Arc<AtomicBool>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls fail as if the URL were malformed
    pub fn reject_urls(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// The `index`-th connection opened (0-based)
    pub fn connection(&self, index: usize) -> MockConnection {
        let shared = self.connections.lock().unwrap()[index].clone();
        MockConnection { shared }
    }

    /// The most recently opened connection
    pub fn last(&self) -> MockConnection {
        let shared = self
            .connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened");
        MockConnection { shared }
    }
}

impl TransportFactory for MockTransportFactory {
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn Transport>> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        let shared = Arc::new(MockShared {
            url: url.to_string(),
            sink: events,
            ready: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            refuse_sends: AtomicBool::new(false),
            closed_by_client: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(shared.clone());
        Ok(Box::new(MockTransport { shared }))
    }
}

struct MockTransport {
    shared: Arc<MockShared>,
}

impl Transport for MockTransport {
    fn send(&self, frame: Frame) -> Result<()> {
        if self.shared.refuse_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("send refused".to_string()));
        }
        self.shared.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.shared.closed_by_client.store(true, Ordering::SeqCst);
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
    }

    fn ready_state(&self) -> ReadyState {
        *self.shared.ready.lock().unwrap()
    }
}

/// Test-side view of a mock connection
#[derive(Clone)]
pub struct MockConnection {
    shared: Arc<MockShared>,
}

impl MockConnection {
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Complete the handshake
    pub fn open(&self) {
        *self.shared.ready.lock().unwrap() = ReadyState::Open;
        self.shared.sink.open();
    }

    /// Deliver a text frame from the peer
    pub fn receive(&self, text: &str) {
        self.shared.sink.message(Frame::from(text));
    }

    /// Deliver a JSON message from the peer
    pub fn receive_json(&self, value: serde_json::Value) {
        self.receive(&value.to_string());
    }

    /// Fail the connection: error followed by close, like a dropped socket
    pub fn fail(&self, reason: &str) {
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
        self.shared.sink.error(reason);
        self.shared.sink.close(None);
    }

    /// Report only an error
    pub fn error(&self, reason: &str) {
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
        self.shared.sink.error(reason);
    }

    /// The peer closes with a close frame
    pub fn close_from_peer(&self, code: u16, reason: &str) {
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
        self.shared.sink.close(Some(CloseInfo {
            code,
            reason: reason.to_string(),
        }));
    }

    pub fn refuse_sends(&self, refuse: bool) {
        self.shared.refuse_sends.store(refuse, Ordering::SeqCst);
    }

    pub fn closed_by_client(&self) -> bool {
        self.shared.closed_by_client.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// Sent text frames, heartbeat pings excluded
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|frame| frame.as_text().map(str::to_string))
            .filter(|text| !text.contains(r#""event":"ping""#))
            .collect()
    }

    /// Number of pings sent on this connection
    pub fn pings_sent(&self) -> usize {
        self.sent()
            .iter()
            .filter_map(Frame::as_text)
            .filter(|text| text.contains(r#""event":"ping""#))
            .count()
    }
}

pub const MOCK_URL: &str = "ws://mock.test/feed";

/// Heartbeat off, no jitter: only the timers a test arms itself
pub fn quiet_config() -> ClientConfig {
    ClientConfig::default()
        .with_heartbeat(false)
        .with_reconnect_jitter(Duration::ZERO)
}

/// A client running over `factory`
pub fn mock_client(factory: &MockTransportFactory, config: ClientConfig) -> SocketClient {
    ClientBuilder::new(MOCK_URL)
        .with_config(config)
        .with_transport(factory.clone())
        .build()
        .unwrap()
}

/// Connect `client` and open the resulting mock connection
pub async fn connect_and_open(
    client: &SocketClient,
    factory: &MockTransportFactory,
) -> MockConnection {
    client.connect().await.unwrap();
    let connection = factory.last();
    connection.open();
    settle(client).await;
    connection
}

/// Wait until the controller has handled everything reported so far
///
/// Any request/reply command works as a barrier because the controller
/// drains transport and timer signals before commands.
pub async fn settle(client: &SocketClient) {
    client.ready_state().await.unwrap();
}

/// Every event received so far, without waiting
pub fn drain_events(events: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// How many of `events` are scheduled reconnects
pub fn reconnects_scheduled(events: &[ConnectionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::Reconnecting { .. }))
        .count()
}

// ---------------------------------------------------------------------------
// Real WebSocket server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Control {
    Push(String),
    Kick,
}

type Handler = Arc<dyn Fn(String) -> Option<String> + Send + Sync>;

/// Mock WebSocket server for end-to-end tests
///
/// Answers `ping` with `pong` and echoes every other text message unless a
/// custom handler says otherwise.
pub struct MockWsServer {
    addr: SocketAddr,
    control: broadcast::Sender<Control>,
    accepted: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<String>,
    shutdown: Option<tokio::task::JoinHandle<()>>,
}

impl MockWsServer {
    /// Start an echoing server
    pub async fn new() -> Self {
        Self::with_handler(|text| {
            if text.contains(r#""event":"ping""#) {
                Some(r#"{"event":"pong","timestamp":0}"#.to_string())
            } else if text.contains(r#""event":"pong""#) {
                None
            } else {
                Some(text)
            }
        })
        .await
    }

    /// Start a server replying with `handler(message)` when it returns `Some`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler: Handler = Arc::new(handler);
        let (control, _) = broadcast::channel(16);
        let accepted = Arc::new(AtomicUsize::new(0));
        let (received_tx, received) = mpsc::unbounded_channel();

        let accept_control = control.clone();
        let accept_count = accepted.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_count.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                let received_tx = received_tx.clone();
                let mut control = accept_control.subscribe();

                tokio::spawn(async move {
                    let Ok(ws_stream) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            incoming = read.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = received_tx.send(text.clone());
                                    if let Some(reply) = handler(text) {
                                        if write.send(Message::Text(reply)).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                            command = control.recv() => match command {
                                Ok(Control::Push(text)) => {
                                    let _ = write.send(Message::Text(text)).await;
                                }
                                Ok(Control::Kick) | Err(_) => {
                                    let _ = write
                                        .send(Message::Close(Some(CloseFrame {
                                            code: CloseCode::Away,
                                            reason: "kicked".into(),
                                        })))
                                        .await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            control,
            accepted,
            received,
            shutdown: Some(task),
        }
    }

    /// WebSocket URL of this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Send `text` to every connected client
    pub fn push(&self, text: &str) {
        let _ = self.control.send(Control::Push(text.to_string()));
    }

    /// Close every current connection with a close frame
    pub fn kick_all(&self) {
        let _ = self.control.send(Control::Kick);
    }

    /// Next text message a client sent, waiting up to five seconds
    pub async fn next_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next non-heartbeat text message a client sent
    pub async fn next_app_message(&mut self) -> Option<String> {
        loop {
            let message = self.next_message().await?;
            if !message.contains(r#""event":"ping""#) && !message.contains(r#""event":"pong""#) {
                return Some(message);
            }
        }
    }

    /// Wait until at least `count` connections were accepted
    pub async fn wait_for_connections(&self, count: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.accepted() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        if let Some(task) = self.shutdown.take() {
            task.abort();
        }
    }
}
