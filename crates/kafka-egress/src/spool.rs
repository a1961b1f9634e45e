//! The in-memory, order-preserving queue of messages awaiting delivery
//! (§3, §9 of the spec). A `VecDeque` is the natural fit: ingress appends
//! at the tail, despool and flush consume from the head, and re-prepending
//! a failed batch is a head-side bulk insert. Owned exclusively by the
//! egress buffer's single run task — no locking.

use common::Message;
use std::collections::VecDeque;

#[derive(Default)]
pub struct Spool {
    messages: VecDeque<Message>,
}

impl Spool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Remove and return up to `max` messages from the head, in order.
    /// Returns fewer than `max` only if the spool holds fewer.
    pub fn take_front(&mut self, max: usize) -> Vec<Message> {
        let n = max.min(self.messages.len());
        self.messages.drain(..n).collect()
    }

    /// Return `messages` to the head of the spool, ahead of anything
    /// already queued there, preserving their original relative order.
    /// This is the "critical ordering rule" from §4.3.3: a failed flush's
    /// batch must come back ahead of anything that arrived while it was
    /// in flight.
    pub fn prepend(&mut self, messages: Vec<Message>) {
        for message in messages.into_iter().rev() {
            self.messages.push_front(message);
        }
    }
}
