//! resock - a self-healing WebSocket client
//!
//! This is the convenience crate re-exporting the resock sub-crates.
//!
//! # Architecture
//!
//! - **resock-core**: frames, messages, the fail-soft codec, errors and
//!   observability setup
//! - **resock-client**: the connection controller: heartbeat, reconnection
//!   with backoff, outbound buffering and subscriber fan-out
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resock::{ConnectionEvent, SocketClient, Subscriber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SocketClient::new("ws://localhost:8080")?;
//!     let _prices = client.subscribe(Subscriber::for_event("price", |msg| {
//!         println!("{:?}", msg.as_json());
//!     }));
//!
//!     client.connect().await?;
//!     client.send_message(serde_json::json!({"event": "subscribe", "channel": "prices"}))?;
//!
//!     let mut events = client.events();
//!     while let Ok(event) = events.recv().await {
//!         if matches!(event, ConnectionEvent::ReconnectExhausted { .. }) {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub use resock_client as client;
pub use resock_core as core;

pub use resock_client::{
    ClientBuilder, ClientConfig, ConnectionEvent, ConnectionState, SocketClient, Subscriber,
    Subscription,
};
pub use resock_core::{Error, Frame, Message, Result};
