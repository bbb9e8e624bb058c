//! The run orchestrator.
//!
//! Lifecycle:
//!
//! ```text
//! Created -> Initializing -> RunningSuperstep(0) -> MasterComputing(0)
//!         -> RunningSuperstep(1) -> ... -> Converged | ReachedMaxIterations
//! ```
//!
//! Any state may move to `Failed`. `release` moves any state to `Released`.
//!
//! Superstep `s`:
//! 1. check the termination flag
//! 2. prepare the messenger for `s` and rebuild the active frontier, both on
//!    the worker pool
//! 3. run `compute` for every active vertex (full barrier)
//! 4. run `master_compute` on the calling thread
//! 5. stop if every vertex voted to halt and no message is pending, if master
//!    compute asked to halt, or if `s + 1 == max_iterations`

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::computation::{Control, PregelComputation};
use crate::computer::{PregelComputer, RunBuffers, RunContext};
use crate::concurrency::TerminationFlag;
use crate::config::PregelConfig;
use crate::context::MasterComputeContext;
use crate::error::{Phase, PregelError, Result};
use crate::graph::Graph;
use crate::messages::MessengerStrategy;
use crate::node_value::NodeValues;
use crate::schema::PregelSchema;

/// Lifecycle state of a [`Pregel`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, nothing allocated.
    Created,
    /// Allocating buffers and running `init`.
    Initializing,
    /// Running `compute` for a superstep.
    RunningSuperstep(usize),
    /// Running `master_compute` for a superstep.
    MasterComputing(usize),
    /// Stopped by the convergence check or by master compute.
    Converged,
    /// Stopped by the superstep cap.
    ReachedMaxIterations,
    /// Stopped by an error.
    Failed,
    /// Retired by `release`.
    Released,
}

impl RunState {
    /// Returns `true` for states a run cannot leave except through `release`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged | Self::ReachedMaxIterations | Self::Failed | Self::Released
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Initializing => f.write_str("initializing"),
            Self::RunningSuperstep(s) => write!(f, "running superstep {s}"),
            Self::MasterComputing(s) => write!(f, "master computing superstep {s}"),
            Self::Converged => f.write_str("converged"),
            Self::ReachedMaxIterations => f.write_str("reached max iterations"),
            Self::Failed => f.write_str("failed"),
            Self::Released => f.write_str("released"),
        }
    }
}

/// Outcome of a completed run.
pub struct PregelResult {
    /// Final per-vertex values. Only public slots are meant for consumers.
    pub node_values: NodeValues,
    /// `true` if the run stopped before the superstep cap.
    pub did_converge: bool,
    /// Index of the superstep in which the run converged, or `max_iterations`
    /// if it hit the cap.
    pub ran_iterations: usize,
}

impl fmt::Debug for PregelResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PregelResult")
            .field("node_count", &self.node_values.node_count())
            .field("did_converge", &self.did_converge)
            .field("ran_iterations", &self.ran_iterations)
            .finish()
    }
}

/// A single Pregel run over `graph` executing `computation`.
///
/// ```rust
/// use pregel::algorithms::ConnectedComponentsPregel;
/// use pregel::{CsrGraph, Pregel, PregelConfig};
///
/// let graph = CsrGraph::from_edges(4, [(0, 1), (2, 3)]).to_undirected();
/// let config = PregelConfig::builder().concurrency(2).build().unwrap();
/// let mut pregel = Pregel::create(graph, config, ConnectedComponentsPregel).unwrap();
/// let result = pregel.run().unwrap();
/// assert!(result.did_converge);
/// assert_eq!(result.node_values.long_value("component", 1), 0);
/// assert_eq!(result.node_values.long_value("component", 3), 2);
/// ```
pub struct Pregel<G, C> {
    graph: G,
    computation: C,
    config: PregelConfig,
    computer: PregelComputer,
    termination: TerminationFlag,
    state: RunState,
}

impl<G: Graph, C: PregelComputation> Pregel<G, C> {
    /// Validates `config` and builds a dedicated pool of `config.concurrency`
    /// threads.
    pub fn create(graph: G, config: PregelConfig, computation: C) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .thread_name(|i| format!("pregel-worker-{i}"))
            .build()?;
        Self::with_executor(graph, config, computation, Arc::new(pool))
    }

    /// Validates `config` and runs on a caller-owned pool.
    pub fn with_executor(
        graph: G,
        config: PregelConfig,
        computation: C,
        executor: Arc<ThreadPool>,
    ) -> Result<Self> {
        config.validate()?;
        let computer = PregelComputer::new(&config, executor);
        debug!(%computer, node_count = graph.node_count(), "created pregel run");
        Ok(Self {
            graph,
            computation,
            config,
            computer,
            termination: TerminationFlag::running(),
            state: RunState::Created,
        })
    }

    /// Replaces the termination flag, e.g. with one shared by several runs.
    #[must_use]
    pub fn with_termination_flag(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// A handle that stops the run from another thread.
    pub fn termination_flag(&self) -> TerminationFlag {
        self.termination.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The run configuration.
    pub fn config(&self) -> &PregelConfig {
        &self.config
    }

    /// The messenger this run will use.
    pub fn messenger_strategy(&self) -> MessengerStrategy {
        MessengerStrategy::select(self.computation.reducer().is_some(), self.config.is_asynchronous)
    }

    /// Estimated peak bytes of a run with `schema` over `node_count` vertices,
    /// excluding array slot contents and messages beyond the first page.
    pub fn memory_estimation(schema: &PregelSchema, node_count: usize, strategy: MessengerStrategy) -> usize {
        RunBuffers::memory_estimation(schema, node_count, strategy)
    }

    /// Runs supersteps until convergence or the superstep cap.
    ///
    /// A run executes at most once. Buffers other than the returned node values
    /// are freed before this returns, whether it succeeds or fails.
    ///
    /// # Errors
    /// - [`PregelError::InvalidState`] if the run was already started or released
    /// - [`PregelError::Computation`] / [`PregelError::MasterCompute`] if a hook failed
    /// - [`PregelError::Terminated`] if the termination flag was raised
    ///
    /// # Panics
    /// Re-raises panics from vertex programs and contract violations after the
    /// run moved to [`RunState::Failed`].
    pub fn run(&mut self) -> Result<PregelResult> {
        if self.state != RunState::Created {
            return Err(PregelError::InvalidState {
                state: self.state.to_string(),
                operation: "run",
            });
        }
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.run_supersteps())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                warn!(state = %self.state, "pregel run panicked");
                transition(&mut self.state, RunState::Failed);
                panic::resume_unwind(payload);
            }
        };
        match outcome {
            Ok(result) => {
                info!(
                    did_converge = result.did_converge,
                    ran_iterations = result.ran_iterations,
                    "pregel run finished"
                );
                Ok(result)
            }
            Err(error) => {
                warn!(%error, superstep = ?error.superstep(), "pregel run failed");
                transition(&mut self.state, RunState::Failed);
                Err(error)
            }
        }
    }

    /// Retires the run. Safe to call any number of times, before or after `run`.
    pub fn release(&mut self) {
        if self.state != RunState::Released {
            transition(&mut self.state, RunState::Released);
        }
    }

    fn run_supersteps(&mut self) -> Result<PregelResult> {
        transition(&mut self.state, RunState::Initializing);
        let node_count = self.graph.node_count();
        let schema = self.computation.schema(&self.config);
        let mut buffers = RunBuffers::allocate(
            &schema,
            node_count,
            self.computation.reducer(),
            self.config.is_asynchronous,
        );
        info!(
            node_count,
            relationship_count = self.graph.relationship_count(),
            messenger = ?buffers.messenger.strategy(),
            computer = %self.computer,
            max_iterations = self.config.max_iterations,
            "starting pregel run"
        );

        let outcome = self.iterate(&mut buffers);
        buffers.release();
        let (did_converge, ran_iterations) = outcome?;
        Ok(PregelResult {
            node_values: buffers.node_values,
            did_converge,
            ran_iterations,
        })
    }

    fn iterate(&mut self, buffers: &mut RunBuffers) -> Result<(bool, usize)> {
        self.termination.assert_running(0)?;
        self.computer.run(&RunContext::new(
            &self.graph,
            &self.computation,
            &self.config,
            buffers,
            &self.termination,
            Phase::Init,
            0,
        ))?;

        let mut superstep = 0;
        loop {
            self.termination.assert_running(superstep)?;
            transition(&mut self.state, RunState::RunningSuperstep(superstep));
            self.computer
                .pool()
                .install(|| buffers.messenger.init_iteration(superstep));
            let active = self.computer.init_iteration(buffers);
            let stats = self.computer.run(&RunContext::new(
                &self.graph,
                &self.computation,
                &self.config,
                buffers,
                &self.termination,
                Phase::Compute,
                superstep,
            ))?;

            transition(&mut self.state, RunState::MasterComputing(superstep));
            let control = self
                .computation
                .master_compute(&mut MasterComputeContext::new(
                    &self.graph,
                    &mut buffers.node_values,
                    &self.config,
                    &self.termination,
                    superstep,
                ))
                .map_err(|source| PregelError::MasterCompute { superstep, source })?;

            let (halted, pending) = self
                .computer
                .pool()
                .install(|| (buffers.vote_bits.cardinality(), buffers.messenger.has_pending_messages()));
            debug!(
                superstep,
                active,
                invocations = stats.invocations,
                messages_sent = stats.messages_sent,
                newly_halted = stats.newly_halted,
                halted,
                pending,
                "superstep finished"
            );

            if control == Control::Halt || (halted == buffers.vote_bits.size() && !pending) {
                transition(&mut self.state, RunState::Converged);
                return Ok((true, superstep));
            }
            superstep += 1;
            if superstep == self.config.max_iterations {
                transition(&mut self.state, RunState::ReachedMaxIterations);
                return Ok((false, superstep));
            }
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "run state transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ComputeContext;
    use crate::error::ComputeResult;
    use crate::graph::CsrGraph;
    use crate::messages::Messages;
    use crate::schema::{ValueType, Visibility};

    struct Noop;

    impl PregelComputation for Noop {
        fn schema(&self, _config: &PregelConfig) -> PregelSchema {
            PregelSchema::builder()
                .add("value", ValueType::Long, Visibility::Public)
                .build()
        }

        fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
            ctx.vote_to_halt();
            Ok(())
        }
    }

    fn create() -> Pregel<CsrGraph, Noop> {
        let config = PregelConfig::builder().concurrency(2).build().unwrap();
        Pregel::create(CsrGraph::from_edges(3, [(0, 1)]), config, Noop).unwrap()
    }

    #[test]
    fn state_moves_to_converged() {
        let mut pregel = create();
        assert_eq!(pregel.state(), RunState::Created);
        let result = pregel.run().unwrap();
        assert_eq!(pregel.state(), RunState::Converged);
        assert!(pregel.state().is_terminal());
        assert_eq!(result.ran_iterations, 0);
        assert!(result.did_converge);
    }

    #[test]
    fn run_twice_is_rejected() {
        let mut pregel = create();
        pregel.run().unwrap();
        match pregel.run() {
            Err(PregelError::InvalidState { operation, state }) => {
                assert_eq!(operation, "run");
                assert_eq!(state, "converged");
            }
            other => panic!("expected invalid state, got {other:?}"),
        }
    }

    #[test]
    fn run_after_release_is_rejected() {
        let mut pregel = create();
        pregel.release();
        pregel.release();
        assert_eq!(pregel.state(), RunState::Released);
        assert!(matches!(pregel.run(), Err(PregelError::InvalidState { .. })));
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let config = PregelConfig {
            concurrency: 0,
            ..PregelConfig::default()
        };
        let err = Pregel::create(CsrGraph::from_edges(1, []), config, Noop).err().unwrap();
        assert!(matches!(err, PregelError::InvalidConfiguration { field: "concurrency", .. }));
    }

    #[test]
    fn strategy_follows_config() {
        let config = PregelConfig::builder().is_asynchronous(true).build().unwrap();
        let pregel = Pregel::create(CsrGraph::from_edges(1, []), config, Noop).unwrap();
        assert_eq!(pregel.messenger_strategy(), MessengerStrategy::AsyncQueue);
    }

    #[test]
    fn memory_estimation_grows_with_node_count() {
        let schema = Noop.schema(&PregelConfig::default());
        let small = Pregel::<CsrGraph, Noop>::memory_estimation(&schema, 1_000, MessengerStrategy::SyncQueue);
        let large = Pregel::<CsrGraph, Noop>::memory_estimation(&schema, 1_000_000, MessengerStrategy::SyncQueue);
        assert!(large > small);
        let reducing = Pregel::<CsrGraph, Noop>::memory_estimation(&schema, 1_000_000, MessengerStrategy::Reducing);
        assert!(reducing > 0);
    }
}
