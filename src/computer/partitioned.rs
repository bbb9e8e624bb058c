//! A fixed number of contiguous partitions, one task each.

use std::sync::Arc;

use rayon::ThreadPool;

use super::compute_step::{ComputeStep, RunContext};
use super::partition::Partition;
use crate::computation::PregelComputation;
use crate::error::Result;
use crate::graph::Graph;

/// Splits the vertex range into exactly `concurrency` partitions and runs each
/// as one task on the pool, waiting for all of them.
pub struct PartitionedComputer {
    pool: Arc<ThreadPool>,
    concurrency: usize,
}

impl PartitionedComputer {
    /// Creates a computer running `concurrency` partitions on `pool`.
    ///
    /// # Panics
    /// Panics if `concurrency == 0`.
    pub fn new(pool: Arc<ThreadPool>, concurrency: usize) -> Self {
        assert!(concurrency > 0, "concurrency must be > 0");
        Self { pool, concurrency }
    }

    /// Number of partitions per superstep.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub(crate) fn run<G: Graph, C: PregelComputation>(&self, run: &RunContext<'_, G, C>) -> Result<()> {
        let partitions = Partition::split(run.node_count(), self.concurrency);
        let mut results: Vec<Option<Result<()>>> = partitions.iter().map(|_| None).collect();
        self.pool.scope(|scope| {
            for (partition, slot) in partitions.iter().zip(results.iter_mut()) {
                if partition.is_empty() {
                    continue;
                }
                let step = ComputeStep::new(run, partition.range());
                scope.spawn(move |_| *slot = Some(step.compute()));
            }
        });
        results.into_iter().flatten().find(Result::is_err).unwrap_or(Ok(()))
    }
}
