//! Connection state and reconnection bookkeeping
//!
//! # Connection States
//!
//! - **Idle**: nothing attempted yet (or construction of the transport failed)
//! - **Connecting**: a transport exists and its handshake is in flight
//! - **Open**: frames flow, heartbeat is running
//! - **Reconnecting**: the connection was lost; a retry is pending, or the
//!   retry budget is exhausted and the client waits for `connect()`
//! - **Closed**: the application closed the client
//!
//! # State Transitions
//!
//! ```text
//!  Idle ──connect()──> Connecting ──open──> Open
//!                          ↑                 │ error / close / heartbeat timeout
//!                          │                 ↓
//!                          └──timer──── Reconnecting ──exhausted──> (dormant)
//!
//!  any ──close()──> Closed
//! ```
//!
//! # The Reconnect Guard
//!
//! An error and a close event usually arrive together for the same dead
//! socket. Only one of them may schedule a retry. [`ReconnectState`] encodes
//! the guard structurally: it is "locked" exactly when it holds a pending
//! reconnect [`Timer`], so there can never be two.

use crate::reconnect::ReconnectionStrategy;
use crate::timer::{Scheduler, Signal, Timer, TimerId};
use std::time::Duration;

/// Controller-wide connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing attempted yet
    Idle,
    /// Handshake in progress
    Connecting,
    /// Connected and operational
    Open,
    /// Connection lost, waiting for the next attempt or for `connect()`
    Reconnecting,
    /// Closed by the application
    Closed,
}

impl ConnectionState {
    /// Numeric encoding used by the connection state gauge
    pub fn as_metric(self) -> i64 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Closed => 4,
        }
    }
}

/// What a reconnect request turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconnectPlan {
    /// A retry is already pending; nothing was scheduled
    AlreadyPending,
    /// The strategy gave up after `attempts` attempts
    Exhausted { attempts: u32 },
    /// Attempt number `attempt` will run after `delay`
    Scheduled { attempt: u32, delay: Duration },
}

/// Attempt counter plus the single pending reconnect timer
#[derive(Debug, Default)]
pub(crate) struct ReconnectState {
    attempts: u32,
    pending: Option<Timer>,
}

impl ReconnectState {
    /// Number of attempts since the last successful open
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a reconnect timer is pending
    pub(crate) fn is_locked(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule the next attempt unless one is pending or the strategy gives up
    pub(crate) fn schedule(
        &mut self,
        strategy: &mut dyn ReconnectionStrategy,
        scheduler: &mut Scheduler,
    ) -> ReconnectPlan {
        if self.is_locked() {
            return ReconnectPlan::AlreadyPending;
        }

        let attempt = self.attempts + 1;
        match strategy.next_delay(attempt) {
            None => ReconnectPlan::Exhausted {
                attempts: self.attempts,
            },
            Some(delay) => {
                self.attempts = attempt;
                self.pending = Some(scheduler.after(delay, Signal::ReconnectDue));
                ReconnectPlan::Scheduled { attempt, delay }
            }
        }
    }

    /// The reconnect timer `id` fired
    ///
    /// Returns `true` and unlocks if it is the pending one.
    pub(crate) fn release(&mut self, id: TimerId) -> bool {
        if matches!(&self.pending, Some(timer) if timer.id() == id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Drop the pending timer, if any
    pub(crate) fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// A connection opened: start counting from zero again
    pub(crate) fn reset(&mut self, strategy: &mut dyn ReconnectionStrategy) {
        self.attempts = 0;
        strategy.reset();
    }
}
