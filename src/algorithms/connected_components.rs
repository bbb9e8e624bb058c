//! Connected components by minimum-label propagation.

use crate::computation::PregelComputation;
use crate::config::PregelConfig;
use crate::context::{ComputeContext, InitContext};
use crate::error::ComputeResult;
use crate::graph::Graph;
use crate::messages::{Messages, MinReducer, Reducer};
use crate::schema::{PregelSchema, ValueType, Visibility};

/// Weakly connected components by minimum-label propagation.
///
/// Every vertex starts labelled with its own id and adopts the smallest label
/// it hears of. Labels only travel along out-relationships, so run it on an
/// undirected graph (see [`crate::CsrGraph::to_undirected`]) to get weakly
/// connected components. Labels are carried as `f64` and are exact for ids
/// below 2^53.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectedComponentsPregel;

impl ConnectedComponentsPregel {
    /// Name of the result slot.
    pub const COMPONENT: &'static str = "component";
}

impl PregelComputation for ConnectedComponentsPregel {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add(Self::COMPONENT, ValueType::Long, Visibility::Public)
            .build()
    }

    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        ctx.set_long(Self::COMPONENT, i64::try_from(ctx.node_id())?);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        let current = ctx.long_value(Self::COMPONENT);
        if ctx.is_initial_superstep() {
            ctx.send_to_neighbors(current as f64);
        } else {
            let smallest = messages.fold(f64::INFINITY, f64::min);
            if smallest < current as f64 {
                let label = smallest as i64;
                ctx.set_long(Self::COMPONENT, label);
                ctx.send_to_neighbors(smallest);
            }
        }
        ctx.vote_to_halt();
        Ok(())
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(MinReducer))
    }
}
