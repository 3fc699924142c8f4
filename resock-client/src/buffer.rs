//! Outbound frames queued while the connection is not open

use resock_core::Frame;
use std::collections::{HashSet, VecDeque};

/// Pending outbound frames, flushed first-queued first-sent
///
/// With deduplication enabled (the default) a frame equal to one already
/// pending is not queued twice. Membership is tracked in a `HashSet` so a
/// long outage keeps every push constant-time.
#[derive(Debug, Default)]
pub(crate) struct PendingBuffer {
    frames: VecDeque<Frame>,
    seen: HashSet<Frame>,
    dedup: bool,
}

impl PendingBuffer {
    pub(crate) fn new(dedup: bool) -> Self {
        Self {
            frames: VecDeque::new(),
            seen: HashSet::new(),
            dedup,
        }
    }

    /// Queue a frame
    ///
    /// Returns `false` if it collapsed into an identical pending frame.
    pub(crate) fn push(&mut self, frame: Frame) -> bool {
        if self.dedup && !self.seen.insert(frame.clone()) {
            return false;
        }
        self.frames.push_back(frame);
        true
    }

    /// Take every pending frame, oldest first
    pub(crate) fn drain(&mut self) -> Vec<Frame> {
        self.seen.clear();
        self.frames.drain(..).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.seen.clear();
        self.frames.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
