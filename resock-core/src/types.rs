//! Wire-level types
//!
//! A [`Frame`] is what travels over the socket: either a text or a binary
//! payload, untouched. A [`Message`] is what the application sees after the
//! codec had a go at a frame: structured JSON when decoding worked, or the
//! original frame when it did not.
//!
//! Every structured message is expected to be a JSON object carrying an
//! `event` field. The events `ping` and `pong` are reserved for the
//! heartbeat protocol and are consumed by the client itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reserved event name of a heartbeat probe
pub const PING_EVENT: &str = "ping";

/// Reserved event name of a heartbeat acknowledgement
pub const PONG_EVENT: &str = "pong";

/// A raw payload as carried by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    /// UTF-8 text payload
    Text(String),
    /// Opaque binary payload
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the text content, if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Frame::Binary(bytes)
    }
}

/// An inbound message after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The frame decoded to JSON
    Json(Value),
    /// The frame was not valid JSON and is passed through unchanged
    Raw(Frame),
}

impl Message {
    /// The `event` tag of a structured message
    ///
    /// Raw frames and JSON values without a string `event` field have no tag.
    pub fn event(&self) -> Option<&str> {
        match self {
            Message::Json(value) => value.get("event").and_then(Value::as_str),
            Message::Raw(_) => None,
        }
    }

    /// Whether this is a reserved `ping`/`pong` message
    pub fn is_heartbeat(&self) -> bool {
        matches!(self.event(), Some(PING_EVENT) | Some(PONG_EVENT))
    }

    /// The decoded JSON value, if decoding succeeded
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Message::Json(value) => Some(value),
            Message::Raw(_) => None,
        }
    }

    /// The undecoded frame, if decoding fell back to passthrough
    pub fn as_raw(&self) -> Option<&Frame> {
        match self {
            Message::Json(_) => None,
            Message::Raw(frame) => Some(frame),
        }
    }
}

/// Heartbeat payload: `{"event": "ping" | "pong", "timestamp": <epoch ms>}`
///
/// The timestamp is advisory. Nothing computes round-trip times from it yet,
/// it is carried so peers can.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub event: String,
    pub timestamp: u64,
}

impl HeartbeatMessage {
    /// A `ping` stamped with the current time
    pub fn ping() -> Self {
        Self {
            event: PING_EVENT.to_string(),
            timestamp: epoch_millis(),
        }
    }

    /// A `pong` stamped with the current time
    pub fn pong() -> Self {
        Self {
            event: PONG_EVENT.to_string(),
            timestamp: epoch_millis(),
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Readiness of a physical transport
///
/// Mirrors the four states a browser `WebSocket` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress
    Connecting = 0,
    /// Frames can be sent
    Open = 1,
    /// Close handshake in progress
    Closing = 2,
    /// Socket is gone
    Closed = 3,
}

impl ReadyState {
    /// Inverse of `state as u8`; out-of-range values map to `Closed`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Close code and reason reported by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_event() {
        let msg = Message::Json(json!({"event": "trade", "price": 10}));
        assert_eq!(msg.event(), Some("trade"));
        assert!(!msg.is_heartbeat());

        let untagged = Message::Json(json!({"price": 10}));
        assert_eq!(untagged.event(), None);

        let numeric_tag = Message::Json(json!({"event": 7}));
        assert_eq!(numeric_tag.event(), None);

        let raw = Message::Raw(Frame::from("hello"));
        assert_eq!(raw.event(), None);
        assert_eq!(raw.as_raw(), Some(&Frame::Text("hello".into())));
    }

    #[test]
    fn test_heartbeat_detection() {
        assert!(Message::Json(json!({"event": "ping"})).is_heartbeat());
        assert!(Message::Json(json!({"event": "pong", "timestamp": 1})).is_heartbeat());
    }

    #[test]
    fn test_heartbeat_message_shape() {
        let ping = serde_json::to_value(HeartbeatMessage::ping()).unwrap();
        assert_eq!(ping["event"], "ping");
        assert!(ping["timestamp"].as_u64().unwrap() > 0);

        let pong = HeartbeatMessage::pong();
        assert_eq!(pong.event, PONG_EVENT);
    }

    #[test]
    fn test_ready_state_from_u8() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closing,
            ReadyState::Closed,
        ] {
            assert_eq!(ReadyState::from_u8(state as u8), state);
        }
        assert_eq!(ReadyState::from_u8(42), ReadyState::Closed);
    }

    #[test]
    fn test_frame_conversions() {
        assert_eq!(Frame::from("a"), Frame::Text("a".into()));
        assert_eq!(Frame::from(vec![1u8, 2]), Frame::Binary(vec![1, 2]));
        assert_eq!(Frame::from("abc").len(), 3);
        assert!(Frame::Binary(Vec::new()).is_empty());
        assert_eq!(Frame::Binary(vec![1]).as_text(), None);
    }
}
