//! Reconnection strategies
//!
//! When the connection drops, the controller asks its strategy how long to
//! wait before the next attempt, or whether to give up altogether.
//!
//! # Built-in Strategy
//!
//! [`ExponentialBackoff`] waits `base * 2^attempt`, capped at a maximum, plus
//! a random jitter so that a fleet of clients cut off by the same outage does
//! not hammer the server in lockstep when it comes back.
//!
//! With the defaults (1 s base, 30 s cap, 100 ms jitter, 5 attempts) the
//! schedule is roughly 2 s, 4 s, 8 s, 16 s, 30 s, then the strategy gives up.
//!
//! # Custom Strategies
//!
//! Implement [`ReconnectionStrategy`] and hand it to
//! `ClientBuilder::with_reconnect`.
//!
//! ```rust
//! use resock_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30))
//!     .with_max_attempts(3);
//!
//! assert_eq!(backoff.next_delay(1), Some(Duration::from_secs(2)));
//! assert_eq!(backoff.next_delay(3), Some(Duration::from_secs(8)));
//! assert_eq!(backoff.next_delay(4), None);
//! ```

use crate::config::ClientConfig;
use rand::Rng;
use std::time::Duration;

/// Trait for reconnection strategies
///
/// The controller keeps the attempt counter; strategies only map an attempt
/// number to a delay. `reset()` is called after every successful open.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt number `attempt` (1-based)
    ///
    /// Returns `None` to stop reconnecting.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Reset any accumulated state after a successful connection
    fn reset(&mut self);
}

/// Capped exponential backoff with additive jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    max_jitter: Duration,
}

impl ExponentialBackoff {
    /// Unlimited attempts, no jitter
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: None,
            max_jitter: Duration::ZERO,
        }
    }

    /// Build the strategy described by a client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_base_delay, config.max_reconnect_delay)
            .with_max_attempts(config.max_reconnect_attempts)
            .with_jitter(config.reconnect_jitter)
    }

    /// Give up after `max_attempts` attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add a uniformly random delay in `[0, max_jitter]` to every backoff
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// The delay before jitter is added
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let base_ms = saturating_millis(self.base_delay);
        let max_ms = saturating_millis(self.max_delay);
        let delay_ms = 2u64
            .checked_pow(attempt)
            .and_then(|factor| base_ms.checked_mul(factor))
            .map_or(max_ms, |ms| ms.min(max_ms));
        Duration::from_millis(delay_ms)
    }

    fn jitter(&self) -> Duration {
        let max_ms = saturating_millis(self.max_jitter);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        Some(self.capped_delay(attempt) + self.jitter())
    }

    fn reset(&mut self) {
        // Stateless: the controller owns the attempt counter
    }
}
