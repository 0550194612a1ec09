//! Email source capability.
//!
//! Sources deliver each new message at least once, best effort. Transport
//! failures are the source's concern: callers only ever observe "no new
//! emails".

use std::collections::VecDeque;

use crate::Email;

/// Pull-based supplier of newly-seen emails.
pub trait EmailSource {
    /// Returns the messages that arrived since the previous call.
    fn pull(&mut self) -> Vec<Email>;
}

/// In-memory source fed by the caller; each pull drains the queue.
#[derive(Debug, Clone, Default)]
pub struct QueuedSource {
    pending: VecDeque<Email>,
}

impl QueuedSource {
    pub fn push(&mut self, email: Email) {
        self.pending.push_back(email);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl EmailSource for QueuedSource {
    fn pull(&mut self) -> Vec<Email> {
        self.pending.drain(..).collect()
    }
}
