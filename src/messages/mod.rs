//! Message passing between supersteps.
//!
//! Three interchangeable strategies share one contract:
//! - `init_iteration(s)` prepares the buffers for superstep `s`
//! - `send_to(target, value)` addresses a message to a vertex
//! - `messages(node)` yields the messages `node` receives in the current superstep
//! - `release()` frees every buffer; it is idempotent
//!
//! | Strategy | Buffers | Visibility |
//! |----------|---------|------------|
//! | [`SyncQueueMessenger`] | two queue sets | next superstep |
//! | [`AsyncQueueMessenger`] | one queue set | possibly the same superstep |
//! | [`ReducingMessenger`] | two value arrays | next superstep, at most one value |
//!
//! None of the strategies blocks: every target-side structure is updated with
//! atomics, since a vertex may receive from many partitions at once.

pub mod async_queue;
pub(crate) mod queues;
pub mod reducer;
pub mod reducing;
pub mod sync_queue;

use core::fmt;

pub use async_queue::AsyncQueueMessenger;
pub use reducer::{CountReducer, MaxReducer, MinReducer, Reducer, SumReducer};
pub use reducing::ReducingMessenger;
pub use sync_queue::SyncQueueMessenger;

use queues::QueueIter;

/// The inbound messages of one vertex in one superstep.
///
/// Message order is unspecified.
pub struct Messages<'a> {
    inner: MessagesInner<'a>,
}

enum MessagesInner<'a> {
    Queue(QueueIter<'a>),
    Single(Option<f64>),
}

impl<'a> Messages<'a> {
    pub(crate) fn queue(iter: QueueIter<'a>) -> Self {
        Self {
            inner: MessagesInner::Queue(iter),
        }
    }

    pub(crate) fn single(value: Option<f64>) -> Self {
        Self {
            inner: MessagesInner::Single(value),
        }
    }

    /// Returns `true` if no (further) message is available.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match &self.inner {
            MessagesInner::Queue(iter) => iter.is_empty(),
            MessagesInner::Single(value) => value.is_none(),
        }
    }
}

impl Iterator for Messages<'_> {
    type Item = f64;

    #[inline]
    fn next(&mut self) -> Option<f64> {
        match &mut self.inner {
            MessagesInner::Queue(iter) => iter.next(),
            MessagesInner::Single(value) => value.take(),
        }
    }
}

/// Which messenger a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessengerStrategy {
    /// [`SyncQueueMessenger`].
    SyncQueue,
    /// [`AsyncQueueMessenger`].
    AsyncQueue,
    /// [`ReducingMessenger`].
    Reducing,
}

impl MessengerStrategy {
    /// Picks the strategy for a computation: a reducer always wins, otherwise
    /// the asynchronous flag decides.
    pub fn select(has_reducer: bool, is_asynchronous: bool) -> Self {
        if has_reducer {
            Self::Reducing
        } else if is_asynchronous {
            Self::AsyncQueue
        } else {
            Self::SyncQueue
        }
    }
}

impl fmt::Display for MessengerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncQueue => f.write_str("sync-queue"),
            Self::AsyncQueue => f.write_str("async-queue"),
            Self::Reducing => f.write_str("reducing"),
        }
    }
}

/// A messenger strategy chosen once per run.
pub enum Messenger {
    /// Double-buffered queues.
    Sync(SyncQueueMessenger),
    /// Single shared queues.
    Async(AsyncQueueMessenger),
    /// One reduced value per vertex.
    Reducing(ReducingMessenger),
    /// Buffers have been freed.
    Released,
}

impl Messenger {
    /// Allocates the messenger selected by `reducer` and `is_asynchronous`.
    pub fn new(node_count: usize, reducer: Option<Box<dyn Reducer>>, is_asynchronous: bool) -> Self {
        match reducer {
            Some(reducer) => Self::Reducing(ReducingMessenger::new(node_count, reducer)),
            None if is_asynchronous => Self::Async(AsyncQueueMessenger::new(node_count)),
            None => Self::Sync(SyncQueueMessenger::new(node_count)),
        }
    }

    /// The active strategy, or `None` after `release`.
    pub fn strategy(&self) -> Option<MessengerStrategy> {
        match self {
            Self::Sync(_) => Some(MessengerStrategy::SyncQueue),
            Self::Async(_) => Some(MessengerStrategy::AsyncQueue),
            Self::Reducing(_) => Some(MessengerStrategy::Reducing),
            Self::Released => None,
        }
    }

    /// Prepares the buffers for `superstep`.
    ///
    /// Must not run concurrently with sends or receives.
    pub fn init_iteration(&mut self, superstep: usize) {
        match self {
            Self::Sync(m) => m.init_iteration(superstep),
            Self::Async(m) => m.init_iteration(superstep),
            Self::Reducing(m) => m.init_iteration(superstep),
            Self::Released => released(),
        }
    }

    /// Sends `value` to `target`.
    ///
    /// # Panics
    /// Panics if `target` is out of range or the messenger was released.
    #[inline]
    pub fn send_to(&self, target: usize, value: f64) {
        match self {
            Self::Sync(m) => m.send_to(target, value),
            Self::Async(m) => m.send_to(target, value),
            Self::Reducing(m) => m.send_to(target, value),
            Self::Released => released(),
        }
    }

    /// Inbound messages of `node` for the current superstep.
    ///
    /// The asynchronous strategy consumes the messages it returns.
    ///
    /// # Panics
    /// Panics if `node` is out of range or the messenger was released.
    #[inline]
    pub fn messages(&self, node: usize) -> Messages<'_> {
        match self {
            Self::Sync(m) => m.messages(node),
            Self::Async(m) => m.messages(node),
            Self::Reducing(m) => m.messages(node),
            Self::Released => released(),
        }
    }

    /// Returns `true` if `node` has inbound messages, without consuming them.
    #[inline]
    pub fn has_messages(&self, node: usize) -> bool {
        match self {
            Self::Sync(m) => m.has_messages(node),
            Self::Async(m) => m.has_messages(node),
            Self::Reducing(m) => m.has_messages(node),
            Self::Released => released(),
        }
    }

    /// Returns `true` if any message is waiting for the next superstep.
    pub fn has_pending_messages(&self) -> bool {
        match self {
            Self::Sync(m) => m.has_pending(),
            Self::Async(m) => m.has_pending(),
            Self::Reducing(m) => m.has_pending(),
            Self::Released => false,
        }
    }

    /// Number of addressable vertices; zero after `release`.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Sync(m) => m.node_count(),
            Self::Async(m) => m.node_count(),
            Self::Reducing(m) => m.node_count(),
            Self::Released => 0,
        }
    }

    /// Frees every buffer. Safe to call repeatedly.
    pub fn release(&mut self) {
        *self = Self::Released;
    }

    /// Returns `true` once `release` was called.
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Bytes currently held by the buffers.
    pub fn allocated_bytes(&self) -> usize {
        match self {
            Self::Sync(m) => m.allocated_bytes(),
            Self::Async(m) => m.allocated_bytes(),
            Self::Reducing(m) => m.allocated_bytes(),
            Self::Released => 0,
        }
    }

    /// Estimated footprint of `strategy` for `node_count` vertices before any
    /// message is sent.
    pub fn memory_estimation(strategy: MessengerStrategy, node_count: usize) -> usize {
        match strategy {
            MessengerStrategy::SyncQueue => SyncQueueMessenger::memory_estimation(node_count),
            MessengerStrategy::AsyncQueue => AsyncQueueMessenger::memory_estimation(node_count),
            MessengerStrategy::Reducing => ReducingMessenger::memory_estimation(node_count),
        }
    }
}

#[cold]
#[track_caller]
fn released() -> ! {
    panic!("messenger used after release")
}
