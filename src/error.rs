//! Error types surfaced by a Pregel run.
//!
//! Every error aborts the whole run. Supersteps are not idempotent (vertex
//! values are mutated in place and reduced messages are combined eagerly), so
//! nothing is retried and no partial result is ever returned.

use core::fmt;
use core::ops::Range;

/// Error type returned by user-supplied vertex programs.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type of user-supplied vertex program hooks.
pub type ComputeResult<T = ()> = Result<T, ComputeError>;

/// The phase of a run in which user code failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Per-vertex `init` before superstep 0.
    Init,
    /// Per-vertex `compute` in a superstep.
    Compute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => f.write_str("init"),
            Phase::Compute => f.write_str("compute"),
        }
    }
}

/// Errors produced while creating or running a Pregel computation.
#[derive(Debug, thiserror::Error)]
pub enum PregelError {
    /// A configuration value was rejected before any superstep ran.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration {
        /// Name of the offending configuration field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A vertex program returned an error.
    #[error("vertex program failed during {phase} in superstep {superstep} (vertices {vertices:?}): {source}")]
    Computation {
        /// Whether the failure happened in `init` or `compute`.
        phase: Phase,
        /// Superstep in which the failure happened.
        superstep: usize,
        /// Vertex id range of the failing compute step.
        vertices: Range<usize>,
        /// The error returned by user code.
        #[source]
        source: ComputeError,
    },

    /// The master compute hook returned an error.
    #[error("master compute failed in superstep {superstep}: {source}")]
    MasterCompute {
        /// Superstep in which the failure happened.
        superstep: usize,
        /// The error returned by user code.
        #[source]
        source: ComputeError,
    },

    /// The cooperative termination signal was observed.
    #[error("run was terminated in superstep {superstep}")]
    Terminated {
        /// Superstep in which the signal was observed.
        superstep: usize,
    },

    /// A lifecycle operation was invoked in a state that does not allow it.
    #[error("cannot {operation} while the run is {state}")]
    InvalidState {
        /// Current lifecycle state.
        state: String,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The executor backing the computer could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PregelError {
    pub(crate) fn invalid_configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error was caused by the termination signal.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }

    /// Superstep in which the error happened, if it happened during a run.
    pub fn superstep(&self) -> Option<usize> {
        match self {
            Self::Computation { superstep, .. }
            | Self::MasterCompute { superstep, .. }
            | Self::Terminated { superstep } => Some(*superstep),
            _ => None,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T, E = PregelError> = core::result::Result<T, E>;
