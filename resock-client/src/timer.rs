//! Owned one-shot timers
//!
//! Every timer the controller arms is a [`Timer`]: a spawned task that sleeps
//! and then posts a [`Signal`] back to the controller. The handle owns the
//! task, so dropping or cancelling a timer aborts it.
//!
//! Aborting is not enough on its own: the signal may already be sitting in
//! the controller's queue when the timer is cancelled. Each timer therefore
//! carries a unique [`TimerId`] that travels with its signal, and the
//! controller ignores any signal whose id is not the one currently armed.

use crate::transport::{ConnectionId, TransportEvent};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TimerId(u64);

/// Inputs the controller receives from transports and timers
#[derive(Debug)]
pub(crate) enum Signal {
    /// An event reported by the transport of connection attempt `connection`
    Transport {
        connection: ConnectionId,
        event: TransportEvent,
    },
    /// The heartbeat send timer fired
    HeartbeatDue(TimerId),
    /// The heartbeat acknowledgement timer fired
    HeartbeatExpired(TimerId),
    /// The reconnect timer fired
    ReconnectDue(TimerId),
}

/// A pending one-shot timer, aborted on drop
#[derive(Debug)]
pub(crate) struct Timer {
    id: TimerId,
    task: JoinHandle<()>,
}

impl Timer {
    pub(crate) fn id(&self) -> TimerId {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Arms timers that report back on the controller's signal channel
///
/// Not `Clone`: timer ids must stay unique per controller.
#[derive(Debug)]
pub(crate) struct Scheduler {
    signals: UnboundedSender<Signal>,
    next_id: u64,
}

impl Scheduler {
    pub(crate) fn new(signals: UnboundedSender<Signal>) -> Self {
        Self {
            signals,
            next_id: 0,
        }
    }

    /// Arm a timer that posts `signal(id)` after `delay`
    pub(crate) fn after(&mut self, delay: Duration, signal: fn(TimerId) -> Signal) -> Timer {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let signals = self.signals.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The controller may be gone already
            let _ = signals.send(signal(id));
        });

        Timer { id, task }
    }

    /// A sender for transport event sinks
    pub(crate) fn signals(&self) -> UnboundedSender<Signal> {
        self.signals.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx);

        let timer = scheduler.after(Duration::from_secs(5), Signal::ReconnectDue);

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        match rx.try_recv() {
            Ok(Signal::ReconnectDue(id)) => assert_eq!(id, timer.id()),
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx);

        let timer = scheduler.after(Duration::from_secs(1), Signal::HeartbeatDue);
        drop(timer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx);

        let a = scheduler.after(Duration::from_secs(1), Signal::HeartbeatDue);
        let b = scheduler.after(Duration::from_secs(1), Signal::HeartbeatDue);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_unique_across_signal_kinds() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx);

        let kinds: [fn(TimerId) -> Signal; 3] = [
            Signal::HeartbeatDue,
            Signal::HeartbeatExpired,
            Signal::ReconnectDue,
        ];
        let timers: Vec<Timer> = (0..300)
            .map(|i| scheduler.after(Duration::from_secs(1), kinds[i % 3]))
            .collect();
        let ids: std::collections::HashSet<TimerId> = timers.iter().map(Timer::id).collect();
        assert_eq!(ids.len(), timers.len());
    }
}
