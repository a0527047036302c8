//! # inbox
//!
//! why: keep delivery order while an activation puts some messages back for later
//! relations: filled by node.rs, drained by each role's act
//! what: Inbox, Cycle (ready and deferred queues)

use std::collections::VecDeque;

use crate::message::Envelope;

/// Ordered queue of messages delivered to a process.
#[derive(Debug, Default)]
pub struct Inbox {
    queue: VecDeque<Envelope>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.queue.iter()
    }

    /// Take every currently queued message into a new cycle.
    ///
    /// Anything pushed after this call is left for the next activation.
    pub fn begin_cycle(&mut self) -> Cycle {
        Cycle {
            ready: std::mem::take(&mut self.queue),
            deferred: Vec::new(),
        }
    }
}

impl Extend<Envelope> for Inbox {
    fn extend<T: IntoIterator<Item = Envelope>>(&mut self, iter: T) {
        self.queue.extend(iter);
    }
}

/// The messages one activation works through.
///
/// `ready` holds what has not been looked at yet, `deferred` what was looked
/// at and left for a later activation.
#[derive(Debug)]
pub struct Cycle {
    ready: VecDeque<Envelope>,
    deferred: Vec<Envelope>,
}

impl Cycle {
    /// Next message to process.
    pub fn next(&mut self) -> Option<Envelope> {
        self.ready.pop_front()
    }

    /// Keep `envelope` for a later activation.
    pub fn defer(&mut self, envelope: Envelope) {
        self.deferred.push(envelope);
    }

    /// Put deferred and unprocessed messages back, ahead of later arrivals.
    ///
    /// Deferred messages arrived before the unprocessed ones, so they go first.
    pub fn finish(self, inbox: &mut Inbox) {
        let later = std::mem::take(&mut inbox.queue);
        inbox.queue.extend(self.deferred);
        inbox.queue.extend(self.ready);
        inbox.queue.extend(later);
    }
}
