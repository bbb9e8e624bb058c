//! Cooperative termination signal.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PregelError, Result};

/// A cloneable flag that asks a running computation to stop.
///
/// The engine checks the flag at every superstep boundary and periodically
/// while iterating a partition. Clones share the same underlying flag, so a
/// handle kept by another thread can stop a run in progress.
#[derive(Clone, Debug, Default)]
pub struct TerminationFlag {
    terminated: Arc<AtomicBool>,
}

impl TerminationFlag {
    /// Creates a flag in the running state.
    pub fn running() -> Self {
        Self::default()
    }

    /// Signals termination to every holder of this flag.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    /// Returns `true` once `terminate` has been called.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Returns `Err(Terminated)` if termination was signalled.
    #[inline]
    pub fn assert_running(&self, superstep: usize) -> Result<()> {
        if self.is_terminated() {
            Err(PregelError::Terminated { superstep })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = TerminationFlag::running();
        let handle = flag.clone();
        assert!(flag.assert_running(0).is_ok());
        handle.terminate();
        assert!(flag.is_terminated());
        let err = flag.assert_running(3).unwrap_err();
        assert!(err.is_terminated());
        assert_eq!(err.superstep(), Some(3));
    }
}
