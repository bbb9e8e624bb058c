//! Scheduling of per-vertex work within a superstep.
//!
//! A computer partitions `0..node_count` into disjoint [`ComputeStep`]s and runs
//! them on a rayon pool. Two strategies are available:
//!
//! | Strategy | Partitions | Balancing |
//! |----------|-----------|-----------|
//! | [`ForkJoinComputer`] | recursive halves down to a threshold | work stealing |
//! | [`PartitionedComputer`] | exactly `concurrency` ranges | none |
//!
//! Both visit every vertex id exactly once per phase and fail fast: once a
//! step returns an error, all other steps stop at their next vertex.

mod compute_step;
mod fork_join;
mod partition;
mod partitioned;

use core::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

pub(crate) use compute_step::{RunBuffers, RunContext};
pub use compute_step::{ComputeStep, StepStats};
pub use fork_join::ForkJoinComputer;
pub use partition::Partition;
pub use partitioned::PartitionedComputer;

use crate::computation::PregelComputation;
use crate::config::PregelConfig;
use crate::error::Result;
use crate::graph::Graph;

/// Smallest vertex batch a worker takes while rebuilding the active frontier.
const FRONTIER_MIN_BATCH: usize = 1 << 12;

/// A scheduling strategy chosen once per run.
pub enum PregelComputer {
    /// Recursive bisection.
    ForkJoin(ForkJoinComputer),
    /// Fixed partitions.
    Partitioned(PartitionedComputer),
}

impl PregelComputer {
    /// Picks the strategy named by `config`.
    pub fn new(config: &PregelConfig, pool: Arc<ThreadPool>) -> Self {
        if config.use_fork_join {
            Self::ForkJoin(ForkJoinComputer::new(pool, config.fork_join_threshold))
        } else {
            Self::Partitioned(PartitionedComputer::new(pool, config.concurrency))
        }
    }

    /// The pool running this computer's steps.
    pub(crate) fn pool(&self) -> &ThreadPool {
        match self {
            Self::ForkJoin(c) => c.pool(),
            Self::Partitioned(c) => c.pool(),
        }
    }

    /// Rebuilds the active frontier for the superstep the messenger was just
    /// prepared for, and returns its size.
    ///
    /// A vertex is active if it has not voted to halt or has inbound messages.
    /// Receiving a message clears the vertex's halt bit.
    pub(crate) fn init_iteration(&self, buffers: &RunBuffers) -> usize {
        let RunBuffers {
            messenger,
            vote_bits,
            active,
            ..
        } = buffers;
        self.pool().install(|| {
            active.clear_all();
            (0..active.size())
                .into_par_iter()
                .with_min_len(FRONTIER_MIN_BATCH)
                .for_each(|node| {
                    if messenger.has_messages(node) {
                        vote_bits.clear(node);
                        active.set(node);
                    } else if !vote_bits.get(node) {
                        active.set(node);
                    }
                });
            active.cardinality()
        })
    }

    /// Runs one phase over every vertex and returns its counters.
    pub(crate) fn run<G: Graph, C: PregelComputation>(&self, run: &RunContext<'_, G, C>) -> Result<StepStats> {
        match self {
            Self::ForkJoin(c) => c.run(run)?,
            Self::Partitioned(c) => c.run(run)?,
        }
        Ok(run.stats())
    }
}

impl fmt::Display for PregelComputer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForkJoin(c) => write!(f, "fork-join(threshold={})", c.threshold()),
            Self::Partitioned(c) => write!(f, "partitioned(concurrency={})", c.concurrency()),
        }
    }
}
