//! Recursive bisection on a work-stealing pool.

use std::sync::Arc;

use rayon::ThreadPool;

use super::compute_step::{ComputeStep, RunContext};
use crate::computation::PregelComputation;
use crate::error::Result;
use crate::graph::Graph;

/// Splits the vertex range in halves until a half holds at most `threshold`
/// vertices, then runs the halves as `rayon::join` tasks.
///
/// Idle workers steal the larger pending halves, which balances skewed degree
/// distributions without knowing them in advance.
pub struct ForkJoinComputer {
    pool: Arc<ThreadPool>,
    threshold: usize,
}

impl ForkJoinComputer {
    /// Creates a computer running on `pool`.
    ///
    /// # Panics
    /// Panics if `threshold == 0`.
    pub fn new(pool: Arc<ThreadPool>, threshold: usize) -> Self {
        assert!(threshold > 0, "fork-join threshold must be > 0");
        Self { pool, threshold }
    }

    /// Leaf size of the bisection.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub(crate) fn run<G: Graph, C: PregelComputation>(&self, run: &RunContext<'_, G, C>) -> Result<()> {
        let root = ComputeStep::new(run, 0..run.node_count());
        let threshold = self.threshold;
        self.pool.install(|| fork_join(root, threshold))
    }
}

fn fork_join<G: Graph, C: PregelComputation>(step: ComputeStep<'_, '_, G, C>, threshold: usize) -> Result<()> {
    if step.len() <= threshold || step.is_aborted() {
        return step.compute();
    }
    let (left, right) = step.split();
    let (left, right) = rayon::join(|| fork_join(left, threshold), || fork_join(right, threshold));
    left.and(right)
}
