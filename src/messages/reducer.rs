//! Message reducers.
//!
//! A reducer folds every message sent to one vertex within one superstep into
//! a single value as the messages arrive. Sends from different partitions are
//! combined in no particular order, so `reduce` must be associative and
//! commutative, and `identity` must be its neutral element.

/// An associative, commutative combiner for `f64` messages.
pub trait Reducer: Send + Sync {
    /// The neutral element: `reduce(identity(), m) == m`.
    fn identity(&self) -> f64;

    /// Combines the value accumulated so far with a newly sent message.
    fn reduce(&self, current: f64, message: f64) -> f64;
}

/// Sums messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumReducer;

impl Reducer for SumReducer {
    fn identity(&self) -> f64 {
        0.0
    }

    #[inline]
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current + message
    }
}

/// Keeps the smallest message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinReducer;

impl Reducer for MinReducer {
    fn identity(&self) -> f64 {
        f64::INFINITY
    }

    #[inline]
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.min(message)
    }
}

/// Keeps the largest message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxReducer;

impl Reducer for MaxReducer {
    fn identity(&self) -> f64 {
        f64::NEG_INFINITY
    }

    #[inline]
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.max(message)
    }
}

/// Counts messages, ignoring their payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountReducer;

impl Reducer for CountReducer {
    fn identity(&self) -> f64 {
        0.0
    }

    #[inline]
    fn reduce(&self, current: f64, _message: f64) -> f64 {
        current + 1.0
    }
}
