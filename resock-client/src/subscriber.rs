//! Subscriber registry for inbound messages
//!
//! Every inbound message that is not a heartbeat is fanned out to the
//! registered subscribers, synchronously and in registration order.
//! A subscriber may be restricted to one message type, matched against the
//! message's `event` field; an unfiltered subscriber sees everything.
//!
//! A callback that panics is isolated: the panic is caught and logged and the
//! remaining subscribers still receive the message.
//!
//! # Examples
//!
//! ```rust,no_run
//! use resock_client::{SocketClient, Subscriber};
//!
//! # async fn example(client: &SocketClient) {
//! let trades = client.subscribe(Subscriber::for_event("trade", |msg| {
//!     println!("trade: {:?}", msg.as_json());
//! }));
//!
//! client.subscribe(Subscriber::new(|msg| println!("any: {:?}", msg)));
//!
//! trades.unsubscribe().await;
//! # }
//! ```

use crate::controller::Command;
use resock_core::Message;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Type for subscriber callbacks
pub type SubscriberFn = Arc<dyn Fn(&Message) + Send + Sync>;

/// A message callback with an optional type filter
#[derive(Clone)]
pub struct Subscriber {
    message_type: Option<String>,
    callback: SubscriberFn,
}

impl Subscriber {
    /// Receive every non-heartbeat message
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self {
            message_type: None,
            callback: Arc::new(callback),
        }
    }

    /// Receive only messages whose `event` equals `message_type`
    pub fn for_event<F>(message_type: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self {
            message_type: Some(message_type.into()),
            callback: Arc::new(callback),
        }
    }

    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    pub(crate) fn matches(&self, message: &Message) -> bool {
        match &self.message_type {
            None => true,
            Some(wanted) => message.event() == Some(wanted.as_str()),
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("message_type", &self.message_type)
            .finish_non_exhaustive()
    }
}

/// Identity of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability to remove one subscriber
///
/// Dropping it leaves the subscriber registered.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber
    ///
    /// Returns `false` if it was already gone (for instance after `close()`)
    /// or the client has shut down.
    pub async fn unsubscribe(self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Unsubscribe { id: self.id, reply })
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

/// Registered subscribers in registration order
#[derive(Debug, Default)]
pub(crate) struct SubscriberRegistry {
    entries: Vec<(SubscriberId, Subscriber)>,
}

impl SubscriberRegistry {
    pub(crate) fn insert(&mut self, id: SubscriberId, subscriber: Subscriber) {
        self.entries.push((id, subscriber));
    }

    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Deliver `message` to every matching subscriber
    ///
    /// Returns how many callbacks completed without panicking.
    pub(crate) fn dispatch(&self, message: &Message) -> usize {
        let mut delivered = 0;
        for (id, subscriber) in &self.entries {
            if !subscriber.matches(message) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(message))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(
                        subscriber = %id,
                        event = ?message.event(),
                        "Subscriber panicked"
                    );
                }
            }
        }
        delivered
    }
}
