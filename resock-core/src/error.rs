//! Error types for resock
//!
//! Only a handful of operations can fail in a way the caller has to see.
//! Transport drops, heartbeat timeouts and codec failures are all recovered
//! from inside the connection controller and never show up here; what is
//! left is the synchronous part of the API:
//!
//! - **InvalidUrl**: the transport factory rejected the URL handed to `connect()`
//! - **Transport**: a transport refused a frame or could not be constructed
//! - **Config**: a `ClientConfig` failed validation
//! - **ControllerStopped**: the controller task is gone
//!
//! # Examples
//!
//! ```rust
//! use resock_core::Error;
//!
//! let error = Error::InvalidUrl("unsupported scheme `http`".into());
//! assert_eq!(error.to_string(), "Invalid URL: unsupported scheme `http`");
//! ```

use thiserror::Error;

/// Result type for resock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by the resock crates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The URL could not be turned into a transport
    ///
    /// Reported synchronously from `connect()`. Construction failures are
    /// never retried automatically.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Transport layer error
    ///
    /// Raised when a transport cannot accept a frame, typically because its
    /// socket already went away.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The connection controller task has exited
    ///
    /// Only happens if the controller panicked; while any handle is alive
    /// the controller keeps running.
    #[error("Connection controller stopped")]
    ControllerStopped,

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
