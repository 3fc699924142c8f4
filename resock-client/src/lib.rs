//! Self-healing WebSocket client
//!
//! This crate keeps one logical connection to a WebSocket endpoint alive on
//! top of a physical socket that may drop at any time. Application code
//! sends and receives messages through a [`SocketClient`]; the client's
//! controller task takes care of everything in between.
//!
//! # Core Features
//!
//! - **Heartbeat**: JSON `ping`/`pong` liveness checks with a deadline
//! - **Auto-Reconnection**: exponential backoff with jitter and an attempt cap
//! - **Outbound Buffering**: frames sent while offline are delivered on reconnect
//! - **Fan-out**: type-filtered subscribers, isolated from each other's panics
//! - **Pluggable Transport**: WebSockets by default, any frame transport via
//!   [`TransportFactory`]
//! - **Observability**: `tracing` logs and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resock_client::{SocketClient, Subscriber};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SocketClient::new("ws://localhost:8080")?;
//!
//!     client.subscribe(Subscriber::for_event("trade", |msg| {
//!         println!("Trade: {:?}", msg.as_json());
//!     }));
//!
//!     client.connect().await?;
//!
//!     // Buffered until the handshake completes
//!     client.send_message(json!({"event": "subscribe", "channel": "trades"}))?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Watching the Connection
//!
//! ```rust,no_run
//! use resock_client::{ConnectionEvent, SocketClient};
//!
//! # async fn example(client: SocketClient) {
//! let mut events = client.events();
//! while let Ok(event) = events.recv().await {
//!     if let ConnectionEvent::ReconnectExhausted { attempts } = event {
//!         eprintln!("gave up after {} attempts", attempts);
//!         client.connect().await.ok();
//!     }
//! }
//! # }
//! ```

mod buffer;
mod client;
mod client_builder;
mod config;
mod connection_state;
mod controller;
mod heartbeat;
mod metrics;
mod reconnect;
mod subscriber;
mod timer;
mod transport;
mod ws;

pub use client::SocketClient;
pub use client_builder::ClientBuilder;
pub use config::ClientConfig;
pub use connection_state::ConnectionState;
pub use controller::ConnectionEvent;
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
pub use subscriber::{Subscriber, SubscriberFn, SubscriberId, Subscription};
pub use transport::{ConnectionId, EventSink, Transport, TransportEvent, TransportFactory};
pub use ws::WebSocketFactory;
