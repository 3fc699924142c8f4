//! Client configuration
//!
//! All timing knobs of the connection controller live in [`ClientConfig`].
//! The defaults match a typical browser-side socket client: a heartbeat
//! every 5 seconds, 10 seconds to answer it, and up to 5 reconnection
//! attempts with delays capped at 30 seconds.
//!
//! Configurations can be built in code or loaded from JSON, where every
//! duration is given in milliseconds:
//!
//! ```rust
//! use resock_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::from_json(r#"{
//!     "heartbeat_interval_ms": 2000,
//!     "max_reconnect_attempts": 8
//! }"#).unwrap();
//!
//! assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
//! assert_eq!(config.max_reconnect_attempts, 8);
//! assert!(config.heartbeat_enabled);
//! ```

use resock_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Send application-level pings while open
    pub heartbeat_enabled: bool,
    /// Idle time before a ping is sent
    #[serde(rename = "heartbeat_interval_ms", with = "duration_ms")]
    pub heartbeat_interval: Duration,
    /// Time a ping may go unanswered before the connection is considered dead
    #[serde(rename = "heartbeat_timeout_ms", with = "duration_ms")]
    pub heartbeat_timeout: Duration,
    /// Consecutive reconnection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Upper bound of the exponential part of the backoff delay
    #[serde(rename = "max_reconnect_delay_ms", with = "duration_ms")]
    pub max_reconnect_delay: Duration,
    /// Backoff unit; attempt `n` waits `base * 2^n` before jitter
    #[serde(rename = "reconnect_base_delay_ms", with = "duration_ms")]
    pub reconnect_base_delay: Duration,
    /// Upper bound of the random delay added to every backoff
    #[serde(rename = "reconnect_jitter_ms", with = "duration_ms")]
    pub reconnect_jitter: Duration,
    /// Collapse identical frames queued while disconnected
    pub dedup_pending: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            heartbeat_enabled: true,
            heartbeat_interval: Duration::from_millis(5000),
            heartbeat_timeout: Duration::from_millis(10000),
            max_reconnect_attempts: 5,
            max_reconnect_delay: Duration::from_millis(30000),
            reconnect_base_delay: Duration::from_millis(1000),
            reconnect_jitter: Duration::from_millis(100),
            dedup_pending: true,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_enabled {
            if self.heartbeat_interval.is_zero() {
                return Err(Error::Config(
                    "heartbeat_interval must be non-zero".to_string(),
                ));
            }
            if self.heartbeat_timeout.is_zero() {
                return Err(Error::Config(
                    "heartbeat_timeout must be non-zero".to_string(),
                ));
            }
        }
        if self.reconnect_base_delay > self.max_reconnect_delay {
            return Err(Error::Config(format!(
                "reconnect_base_delay ({:?}) exceeds max_reconnect_delay ({:?})",
                self.reconnect_base_delay, self.max_reconnect_delay
            )));
        }
        Ok(())
    }

    /// Enable or disable heartbeats
    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat_enabled = enabled;
        self
    }

    /// Set the heartbeat send interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat acknowledgement timeout
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the maximum number of consecutive reconnection attempts
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the cap of the exponential backoff
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set the backoff unit
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set the jitter bound
    pub fn with_reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Choose between set (deduplicating) and queue semantics for the pending buffer
    pub fn with_dedup_pending(mut self, dedup: bool) -> Self {
        self.dedup_pending = dedup;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
