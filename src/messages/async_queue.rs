//! Single-buffered message queues.
//!
//! Sends land in the one shared queue immediately, so a vertex computed later
//! in the same superstep may already receive them. Which messages arrive early
//! depends on scheduling; only vertex programs that tolerate any delivery order
//! should run on this messenger.
//!
//! Receiving detaches the vertex's whole list. Between supersteps the lists
//! still linked are moved into the spare buffer so the arena can be recycled.

use crate::messages::queues::{MessageQueues, NIL};
use crate::messages::Messages;

/// Messenger delivering messages as soon as they are sent.
pub struct AsyncQueueMessenger {
    buffers: [MessageQueues; 2],
    current: usize,
}

impl AsyncQueueMessenger {
    /// Allocates queues for `node_count` vertices.
    pub fn new(node_count: usize) -> Self {
        Self {
            buffers: [MessageQueues::new(node_count), MessageQueues::new(node_count)],
            current: 0,
        }
    }

    pub(crate) fn init_iteration(&mut self, _superstep: usize) {
        let spare = 1 - self.current;
        self.buffers[spare].clear();
        self.buffers[self.current].drain_into(&self.buffers[spare]);
        self.buffers[self.current].clear();
        self.current = spare;
    }

    #[inline]
    pub(crate) fn send_to(&self, target: usize, value: f64) {
        self.buffers[self.current].push(target, value);
    }

    #[inline]
    pub(crate) fn messages(&self, node: usize) -> Messages<'_> {
        let queues = &self.buffers[self.current];
        Messages::queue(queues.iter_from(queues.take(node)))
    }

    #[inline]
    pub(crate) fn has_messages(&self, node: usize) -> bool {
        self.buffers[self.current].peek(node) != NIL
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.buffers[self.current].has_pending()
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
