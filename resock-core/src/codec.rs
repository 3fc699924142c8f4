//! Fail-soft codec for socket payloads
//!
//! Unlike a strict codec, nothing in here returns an error. Decoding a frame
//! that is not JSON hands the frame back untouched, and encoding a value that
//! cannot be serialized hands the value back untouched. A subscriber may
//! therefore receive an undecoded string where it expected an object; that is
//! intended, the connection must keep flowing even when a peer sends garbage.
//!
//! # Pluggable codecs
//!
//! The client talks to its codec through the [`Codec`] trait. [`JsonCodec`]
//! is the default and simply delegates to the free functions below.
//!
//! # Examples
//!
//! ```rust
//! use resock_core::{codec, Frame, Message};
//!
//! // Valid JSON decodes to a structured message
//! let msg = codec::decode(Frame::from(r#"{"event":"trade","px":1}"#));
//! assert_eq!(msg.event(), Some("trade"));
//!
//! // Anything else is passed through as-is
//! let msg = codec::decode(Frame::from("hello"));
//! assert_eq!(msg, Message::Raw(Frame::from("hello")));
//! ```

use crate::types::{Frame, Message};
use serde::Serialize;
use serde_json::Value;

/// Outcome of an encode attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded<T> {
    /// The value serialized to a text frame
    Frame(Frame),
    /// Serialization failed; the original value is returned unchanged
    Passthrough(T),
}

impl<T> Encoded<T> {
    /// The encoded frame, discarding a passthrough value
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Encoded::Frame(frame) => Some(frame),
            Encoded::Passthrough(_) => None,
        }
    }
}

/// Decode a frame into a message
///
/// Text and binary frames are both parsed as JSON. On failure the frame is
/// returned as [`Message::Raw`].
pub fn decode(frame: Frame) -> Message {
    let parsed = match &frame {
        Frame::Text(text) => serde_json::from_str::<Value>(text),
        Frame::Binary(bytes) => serde_json::from_slice::<Value>(bytes),
    };

    match parsed {
        Ok(value) => Message::Json(value),
        Err(_) => Message::Raw(frame),
    }
}

/// Encode a serializable value into a text frame
///
/// On failure the value comes back as [`Encoded::Passthrough`].
pub fn encode<T: Serialize>(value: T) -> Encoded<T> {
    match serde_json::to_string(&value) {
        Ok(text) => Encoded::Frame(Frame::Text(text)),
        Err(_) => Encoded::Passthrough(value),
    }
}

/// Whether `text` parses as JSON
pub fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

/// Translation between frames and structured values
///
/// Implementations must be fail-soft: `decode` and `encode` never error,
/// they fall back to passthrough instead.
pub trait Codec: Send + Sync + 'static {
    /// Decode an inbound frame
    fn decode(&self, frame: Frame) -> Message;

    /// Encode an outbound structured value
    fn encode(&self, value: Value) -> Encoded<Value>;
}

/// The default JSON codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, frame: Frame) -> Message {
        decode(frame)
    }

    fn encode(&self, value: Value) -> Encoded<Value> {
        encode(value)
    }
}
