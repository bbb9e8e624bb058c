//! Reducing messenger.
//!
//! Keeps one combined value per vertex and superstep instead of a queue.
//! Double-buffered like the synchronous queues: superstep `s` reduces into
//! buffer `s % 2` and reads buffer `(s + 1) % 2`.

use crate::collections::HugeAtomicDoubleArray;
use crate::concurrency::HugeAtomicBitSet;
use crate::messages::{Messages, Reducer};

struct ReducedBuffer {
    values: HugeAtomicDoubleArray,
    received: HugeAtomicBitSet,
}

impl ReducedBuffer {
    fn new(node_count: usize, identity: f64) -> Self {
        Self {
            values: HugeAtomicDoubleArray::new(node_count, identity),
            received: HugeAtomicBitSet::new(node_count),
        }
    }

    fn clear(&self, identity: f64) {
        if !self.received.is_empty() {
            self.values.fill(identity);
            self.received.clear_all();
        }
    }
}

/// Messenger combining all messages to a vertex with a [`Reducer`].
pub struct ReducingMessenger {
    reducer: Box<dyn Reducer>,
    buffers: [ReducedBuffer; 2],
    write: usize,
}

impl ReducingMessenger {
    /// Allocates one slot per vertex in each buffer.
    pub fn new(node_count: usize, reducer: Box<dyn Reducer>) -> Self {
        let identity = reducer.identity();
        Self {
            buffers: [
                ReducedBuffer::new(node_count, identity),
                ReducedBuffer::new(node_count, identity),
            ],
            reducer,
            write: 0,
        }
    }

    pub(crate) fn init_iteration(&mut self, superstep: usize) {
        self.write = superstep % 2;
        self.buffers[self.write].clear(self.reducer.identity());
    }

    #[inline]
    pub(crate) fn send_to(&self, target: usize, value: f64) {
        let buffer = &self.buffers[self.write];
        let reducer = &*self.reducer;
        buffer.values.update(target, |current| reducer.reduce(current, value));
        buffer.received.set(target);
    }

    #[inline]
    pub(crate) fn messages(&self, node: usize) -> Messages<'_> {
        let read = &self.buffers[1 - self.write];
        Messages::single(read.received.get(node).then(|| read.values.get(node)))
    }

    #[inline]
    pub(crate) fn has_messages(&self, node: usize) -> bool {
        self.buffers[1 - self.write].received.get(node)
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.buffers[self.write].received.is_empty()
    }

    pub(crate) fn node_count(&self) -> usize {
        self.buffers[0].values.size()
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        2 * Self::per_buffer_bytes(self.node_count())
    }

    fn per_buffer_bytes(node_count: usize) -> usize {
        HugeAtomicDoubleArray::memory_estimation(node_count)
            + HugeAtomicBitSet::memory_estimation(node_count)
    }

    /// Estimated footprint of both buffers.
    pub fn memory_estimation(node_count: usize) -> usize {
        2 * Self::per_buffer_bytes(node_count)
    }
}
