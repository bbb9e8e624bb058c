//! The vertex program interface.

use crate::config::PregelConfig;
use crate::context::{ComputeContext, InitContext, MasterComputeContext};
use crate::error::ComputeResult;
use crate::graph::Graph;
use crate::messages::{Messages, Reducer};
use crate::schema::PregelSchema;

/// Outcome of `master_compute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Proceed with the next superstep unless the run converged.
    Continue,
    /// Stop after this superstep and report convergence.
    Halt,
}

/// A vertex-centric algorithm.
///
/// The engine calls `init` once per vertex, then `compute` once per active
/// vertex per superstep, then `master_compute` once per superstep. `init` and
/// `compute` run concurrently for disjoint vertices; `&self` is shared across
/// all workers.
///
/// Returning an error from any hook aborts the run.
///
/// ```rust
/// use pregel::{ComputeContext, ComputeResult, Graph, Messages, PregelComputation, PregelConfig};
/// use pregel::schema::{PregelSchema, ValueType, Visibility};
///
/// /// Counts the messages each vertex receives in superstep 1.
/// struct InDegree;
///
/// impl PregelComputation for InDegree {
///     fn schema(&self, _config: &PregelConfig) -> PregelSchema {
///         PregelSchema::builder()
///             .add("in_degree", ValueType::Long, Visibility::Public)
///             .build()
///     }
///
///     fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
///         if ctx.is_initial_superstep() {
///             ctx.send_to_neighbors(1.0);
///         } else {
///             ctx.set_long("in_degree", messages.count() as i64);
///         }
///         ctx.vote_to_halt();
///         Ok(())
///     }
/// }
/// ```
pub trait PregelComputation: Send + Sync {
    /// Per-vertex slots of this algorithm.
    fn schema(&self, config: &PregelConfig) -> PregelSchema;

    /// Initializes one vertex before superstep 0.
    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        let _ = ctx;
        Ok(())
    }

    /// Processes one active vertex and its inbound messages.
    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult;

    /// Runs once after every superstep, before the convergence check.
    fn master_compute<G: Graph>(&self, ctx: &mut MasterComputeContext<'_, G>) -> ComputeResult<Control> {
        let _ = ctx;
        Ok(Control::Continue)
    }

    /// Combiner for messages addressed to the same vertex.
    ///
    /// Supplying a reducer selects the reducing messenger regardless of
    /// [`PregelConfig::is_asynchronous`].
    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        None
    }
}

impl<C: PregelComputation> PregelComputation for &C {
    fn schema(&self, config: &PregelConfig) -> PregelSchema {
        (**self).schema(config)
    }

    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        (**self).init(ctx)
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        (**self).compute(ctx, messages)
    }

    fn master_compute<G: Graph>(&self, ctx: &mut MasterComputeContext<'_, G>) -> ComputeResult<Control> {
        (**self).master_compute(ctx)
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        (**self).reducer()
    }
}
