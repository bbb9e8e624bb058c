//! PageRank by delta propagation.

use serde::{Deserialize, Serialize};

use crate::computation::PregelComputation;
use crate::config::PregelConfig;
use crate::context::{ComputeContext, InitContext};
use crate::error::ComputeResult;
use crate::graph::Graph;
use crate::messages::{Messages, Reducer, SumReducer};
use crate::schema::{PregelSchema, ValueType, Visibility};

/// Delta-propagating PageRank.
///
/// Every vertex starts with `(1 - d) / n` and forwards each change of its rank,
/// damped and split over its out-degree. A vertex stops forwarding once the
/// change falls to `tolerance` or below; the run converges when no vertex
/// forwards anything. Rank reaching a vertex without out-relationships is not
/// redistributed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankPregel {
    /// Probability of following a relationship, in `0..1`.
    pub damping_factor: f64,
    /// Largest rank change that is no longer forwarded.
    pub tolerance: f64,
}

impl PageRankPregel {
    /// Name of the result slot.
    pub const RANK: &'static str = "rank";
}

impl Default for PageRankPregel {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            tolerance: 1e-7,
        }
    }
}

impl PregelComputation for PageRankPregel {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add(Self::RANK, ValueType::Double, Visibility::Public)
            .build()
    }

    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        let base = (1.0 - self.damping_factor) / ctx.node_count() as f64;
        ctx.set_double(Self::RANK, base);
        Ok(())
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        let rank = ctx.double_value(Self::RANK);
        let delta = if ctx.is_initial_superstep() {
            rank
        } else {
            let delta: f64 = messages.sum();
            ctx.set_double(Self::RANK, rank + delta);
            delta
        };
        let degree = ctx.degree();
        if delta > self.tolerance && degree > 0 {
            ctx.send_to_neighbors(self.damping_factor * delta / degree as f64);
        }
        ctx.vote_to_halt();
        Ok(())
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(SumReducer))
    }
}
