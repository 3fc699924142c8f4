//! WebSocket transport over `tokio-tungstenite`
//!
//! [`WebSocketFactory::open`] validates the URL synchronously and then
//! spawns one task per connection that performs the handshake and pumps
//! frames in both directions:
//!
//! ```text
//!  controller ──send()──> mpsc ──> [socket task] ──> WebSocket
//!  controller <──EventSink── [socket task] <── WebSocket
//! ```
//!
//! Protocol-level ping/pong frames are answered by tungstenite itself and
//! never reach the controller; the controller's own heartbeat runs on top
//! as JSON messages.

use crate::transport::{EventSink, Transport, TransportFactory};
use futures::{SinkExt, StreamExt};
use resock_core::{CloseInfo, Error, Frame, ReadyState, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;

/// Opens WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn Transport>> {
        let request = client_request(url)?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

        tokio::spawn(run_socket(request, outgoing_rx, events, ready.clone()));

        Ok(Box::new(WebSocketTransport {
            outgoing: outgoing_tx,
            ready,
        }))
    }
}

fn client_request(url: &str) -> Result<Request> {
    let request = url
        .into_client_request()
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match request.uri().scheme_str() {
        Some("ws") | Some("wss") => {}
        Some(other) => {
            return Err(Error::InvalidUrl(format!("unsupported scheme `{}`", other)));
        }
        None => return Err(Error::InvalidUrl(format!("missing scheme in `{}`", url))),
    }
    if request.uri().host().is_none() {
        return Err(Error::InvalidUrl(format!("missing host in `{}`", url)));
    }

    Ok(request)
}

enum Outgoing {
    Frame(Frame),
    Close,
}

/// Handle to a socket task
struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    ready: Arc<AtomicU8>,
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: Frame) -> Result<()> {
        self.outgoing
            .send(Outgoing::Frame(frame))
            .map_err(|_| Error::Transport("socket task has exited".to_string()))
    }

    fn close(&self) {
        self.ready
            .fetch_max(ReadyState::Closing as u8, Ordering::SeqCst);
        let _ = self.outgoing.send(Outgoing::Close);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }
}

async fn run_socket(
    request: Request,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: EventSink,
    ready: Arc<AtomicU8>,
) {
    let connection = events.connection();

    let stream = match connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::debug!(connection = %connection, error = %e, "WebSocket handshake failed");
            ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
            events.error(e.to_string());
            events.close(None);
            return;
        }
    };

    // close() may have been requested during the handshake
    if ready
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok()
    {
        events.open();
    }

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Frame(frame)) => {
                    if let Err(e) = write.send(into_ws_message(frame)).await {
                        ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
                        events.error(e.to_string());
                        break;
                    }
                }
                // Close requested, or the controller dropped the transport
                Some(Outgoing::Close) | None => {
                    ready.store(ReadyState::Closing as u8, Ordering::SeqCst);
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.message(Frame::Text(text));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    events.message(Frame::Binary(bytes));
                }
                Some(Ok(Message::Close(frame))) => {
                    ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    events.close(frame.map(|f| CloseInfo {
                        code: f.code.into(),
                        reason: f.reason.to_string(),
                    }));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    events.error(e.to_string());
                    break;
                }
                None => {
                    ready.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    events.close(None);
                    break;
                }
            },
        }
    }

    tracing::trace!(connection = %connection, "Socket task exiting");
}

fn into_ws_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(bytes) => Message::Binary(bytes),
    }
}
