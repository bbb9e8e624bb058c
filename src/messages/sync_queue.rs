//! Double-buffered message queues.
//!
//! Superstep `s` writes into buffer `s % 2` and reads buffer `(s + 1) % 2`,
//! which holds what was sent during `s - 1`. The write buffer of `s` was the
//! read buffer of `s - 1`, so it is cleared when `s` begins. Together with the
//! superstep barrier this makes a message visible exactly one superstep after
//! it was sent.

use crate::messages::queues::MessageQueues;
use crate::messages::Messages;

/// Messenger delivering messages in the superstep after they were sent.
pub struct SyncQueueMessenger {
    buffers: [MessageQueues; 2],
    write: usize,
}

impl SyncQueueMessenger {
    /// Allocates queues for `node_count` vertices.
    pub fn new(node_count: usize) -> Self {
        Self {
            buffers: [MessageQueues::new(node_count), MessageQueues::new(node_count)],
            write: 0,
        }
    }

    pub(crate) fn init_iteration(&mut self, superstep: usize) {
        self.write = superstep % 2;
        self.buffers[self.write].clear();
    }

    #[inline]
    pub(crate) fn send_to(&self, target: usize, value: f64) {
        self.buffers[self.write].push(target, value);
    }

    #[inline]
    pub(crate) fn messages(&self, node: usize) -> Messages<'_> {
        let read = &self.buffers[1 - self.write];
        Messages::queue(read.iter_from(read.peek(node)))
    }

    #[inline]
    pub(crate) fn has_messages(&self, node: usize) -> bool {
        self.buffers[1 - self.write].peek(node) != super::queues::NIL
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.buffers[self.write].is_empty()
    }

    pub(crate) fn node_count(&self) -> usize {
        self.buffers[0].node_count()
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        self.buffers.iter().map(MessageQueues::allocated_bytes).sum()
    }

    /// Estimated footprint before any message is sent.
    pub fn memory_estimation(node_count: usize) -> usize {
        2 * MessageQueues::memory_estimation(node_count)
    }
}
