//! Core types and codec for resock
//!
//! This crate holds everything about resock that is not tied to a running
//! connection:
//!
//! - **Types**: raw [`Frame`]s, decoded [`Message`]s, the heartbeat payload,
//!   transport [`ReadyState`]
//! - **Codec**: fail-soft JSON encoding and decoding behind the [`Codec`] trait
//! - **Error handling**: the shared [`Error`] type
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! The `resock-client` crate builds the connection controller on top of it.
//!
//! # Example
//!
//! ```rust
//! use resock_core::{codec, Frame, HeartbeatMessage};
//!
//! let frame = codec::encode(HeartbeatMessage::ping()).into_frame().unwrap();
//! let message = codec::decode(frame);
//! assert!(message.is_heartbeat());
//!
//! let raw = codec::decode(Frame::from("plain text"));
//! assert_eq!(raw.event(), None);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use codec::{Codec, Encoded, JsonCodec};
pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    CloseInfo, Frame, HeartbeatMessage, Message, ReadyState, PING_EVENT, PONG_EVENT,
};
