//! Application-level heartbeat
//!
//! A TCP connection can die without either side noticing: no FIN, no RST,
//! just silence. The heartbeat detects that by keeping two timers while the
//! connection is open:
//!
//! ```text
//!  Open ──interval──> send ping ──timeout──> dead: reconnect
//!                        │
//!                        └── pong ──> re-arm interval
//! ```
//!
//! At most one of each timer is ever armed. Both are dropped (and therefore
//! aborted) by [`Heartbeat::stop`], which the controller calls whenever the
//! connection leaves `Open`.

use crate::timer::{Scheduler, Signal, Timer, TimerId};
use std::time::Duration;

/// Heartbeat timers of the current connection
#[derive(Debug)]
pub(crate) struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    send_timer: Option<Timer>,
    ack_timer: Option<Timer>,
}

impl Heartbeat {
    pub(crate) fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            send_timer: None,
            ack_timer: None,
        }
    }

    /// (Re)start the cycle: cancel both timers and arm the send timer
    pub(crate) fn arm(&mut self, scheduler: &mut Scheduler) {
        self.stop();
        self.send_timer = Some(scheduler.after(self.interval, Signal::HeartbeatDue));
    }

    /// The send timer `id` fired
    ///
    /// Returns `true` if it was the armed one; the caller then sends a ping.
    /// The acknowledgement timer is armed in the same step.
    pub(crate) fn on_send_due(&mut self, id: TimerId, scheduler: &mut Scheduler) -> bool {
        if !matches!(&self.send_timer, Some(timer) if timer.id() == id) {
            return false;
        }
        self.send_timer = None;
        self.ack_timer = Some(scheduler.after(self.timeout, Signal::HeartbeatExpired));
        true
    }

    /// The acknowledgement timer `id` fired
    ///
    /// Returns `true` if it was the armed one, meaning the peer missed its pong.
    pub(crate) fn on_ack_expired(&mut self, id: TimerId) -> bool {
        if !matches!(&self.ack_timer, Some(timer) if timer.id() == id) {
            return false;
        }
        self.ack_timer = None;
        true
    }

    /// A pong arrived: the connection is alive, restart the cycle
    pub(crate) fn on_pong(&mut self, scheduler: &mut Scheduler) {
        self.arm(scheduler);
    }

    /// Cancel both timers
    pub(crate) fn stop(&mut self) {
        self.send_timer = None;
        self.ack_timer = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.send_timer.is_some() || self.ack_timer.is_some()
    }

    pub(crate) fn awaiting_pong(&self) -> bool {
        self.ack_timer.is_some()
    }
}
