//! Single-source shortest paths over relationship weights.

use crate::computation::PregelComputation;
use crate::config::PregelConfig;
use crate::context::{ComputeContext, InitContext};
use crate::error::ComputeResult;
use crate::graph::Graph;
use crate::messages::{Messages, MinReducer, Reducer};
use crate::schema::{PregelSchema, ValueType, Visibility};

/// Single-source shortest paths over non-negative relationship weights.
///
/// A Bellman-Ford style relaxation: a vertex whose distance improves offers
/// `distance + weight` to each neighbor. Unweighted graphs use weight 1.
/// Unreachable vertices keep `f64::INFINITY`.
#[derive(Debug, Clone, Copy)]
pub struct SingleSourceShortestPath {
    source: usize,
}

impl SingleSourceShortestPath {
    /// Name of the result slot.
    pub const DISTANCE: &'static str = "distance";

    /// Distances from the vertex with dense id `source`.
    pub fn new(source: usize) -> Self {
        Self { source }
    }

    /// Dense id of the source vertex.
    pub fn source(&self) -> usize {
        self.source
    }

    fn relax<G: Graph>(ctx: &ComputeContext<'_, G>, distance: f64) {
        ctx.for_each_weighted_neighbor(1.0, |target, weight| ctx.send_to(target, distance + weight));
    }
}

impl PregelComputation for SingleSourceShortestPath {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add_double_with_default(Self::DISTANCE, f64::INFINITY, Visibility::Public)
            .build()
    }

    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        if ctx.node_id() == self.source {
            ctx.set_double(Self::DISTANCE, 0.0);
        }
        Ok(())
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        if ctx.is_initial_superstep() {
            if ctx.node_id() == self.source {
                Self::relax(ctx, 0.0);
            }
        } else {
            let offered = messages.fold(f64::INFINITY, f64::min);
            if offered < ctx.double_value(Self::DISTANCE) {
                ctx.set_double(Self::DISTANCE, offered);
                Self::relax(ctx, offered);
            }
        }
        ctx.vote_to_halt();
        Ok(())
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(MinReducer))
    }
}
