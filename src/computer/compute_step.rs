//! The unit of scheduled work: one vertex range in one phase of a superstep.
//!
//! A [`ComputeStep`] owns nothing but its range and a shared reference to the
//! [`RunContext`] of the current superstep. Steps are created by the computers
//! and consumed by `compute`, so every vertex id is visited by exactly one step.

use core::ops::Range;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use tracing::trace;

use crate::computation::PregelComputation;
use crate::concurrency::{HugeAtomicBitSet, TerminationFlag};
use crate::config::PregelConfig;
use crate::context::{ComputeContext, InitContext, VertexContext};
use crate::error::{ComputeError, Phase, PregelError, Result};
use crate::graph::Graph;
use crate::messages::{Messenger, MessengerStrategy, Reducer};
use crate::node_value::NodeValues;
use crate::schema::PregelSchema;

/// Vertices visited between two polls of the termination flag.
const TERMINATION_CHECK_INTERVAL: usize = 1 << 10;

/// Mutable state of one run, owned by the orchestrator.
pub(crate) struct RunBuffers {
    pub(crate) node_values: NodeValues,
    pub(crate) vote_bits: HugeAtomicBitSet,
    pub(crate) active: HugeAtomicBitSet,
    pub(crate) messenger: Messenger,
}

impl RunBuffers {
    pub(crate) fn allocate(
        schema: &PregelSchema,
        node_count: usize,
        reducer: Option<Box<dyn Reducer>>,
        is_asynchronous: bool,
    ) -> Self {
        Self {
            node_values: NodeValues::new(schema, node_count),
            vote_bits: HugeAtomicBitSet::new(node_count),
            active: HugeAtomicBitSet::new(node_count),
            messenger: Messenger::new(node_count, reducer, is_asynchronous),
        }
    }

    pub(crate) fn memory_estimation(
        schema: &PregelSchema,
        node_count: usize,
        strategy: MessengerStrategy,
    ) -> usize {
        NodeValues::memory_estimation(schema, node_count)
            + 2 * HugeAtomicBitSet::memory_estimation(node_count)
            + Messenger::memory_estimation(strategy, node_count)
    }

    /// Frees the message buffers and bitsets, keeping the node values.
    pub(crate) fn release(&mut self) {
        self.messenger.release();
        self.vote_bits = HugeAtomicBitSet::new(0);
        self.active = HugeAtomicBitSet::new(0);
    }
}

/// Work counters of one superstep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Vertex program invocations.
    pub invocations: usize,
    /// Messages sent.
    pub messages_sent: usize,
    /// Vertices that voted to halt.
    pub newly_halted: usize,
}

#[derive(Default)]
struct StepCounters {
    invocations: CachePadded<AtomicUsize>,
    messages_sent: CachePadded<AtomicUsize>,
    newly_halted: CachePadded<AtomicUsize>,
}

impl StepCounters {
    fn record(&self, invocations: usize, messages_sent: usize, newly_halted: usize) {
        self.invocations.fetch_add(invocations, Ordering::Relaxed);
        self.messages_sent.fetch_add(messages_sent, Ordering::Relaxed);
        self.newly_halted.fetch_add(newly_halted, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StepStats {
        StepStats {
            invocations: self.invocations.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            newly_halted: self.newly_halted.load(Ordering::Relaxed),
        }
    }
}

/// Everything the steps of one phase share.
///
/// Lives for exactly one phase; the abort flag and counters start fresh.
pub(crate) struct RunContext<'a, G, C> {
    graph: &'a G,
    computation: &'a C,
    config: &'a PregelConfig,
    buffers: &'a RunBuffers,
    termination: &'a TerminationFlag,
    phase: Phase,
    superstep: usize,
    abort: AtomicBool,
    counters: StepCounters,
}

impl<'a, G: Graph, C: PregelComputation> RunContext<'a, G, C> {
    pub(crate) fn new(
        graph: &'a G,
        computation: &'a C,
        config: &'a PregelConfig,
        buffers: &'a RunBuffers,
        termination: &'a TerminationFlag,
        phase: Phase,
        superstep: usize,
    ) -> Self {
        Self {
            graph,
            computation,
            config,
            buffers,
            termination,
            phase,
            superstep,
            abort: AtomicBool::new(false),
            counters: StepCounters::default(),
        }
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub(crate) fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> StepStats {
        self.counters.snapshot()
    }
}

/// A contiguous vertex range processed by one worker.
pub struct ComputeStep<'r, 'a, G, C> {
    run: &'r RunContext<'a, G, C>,
    range: Range<usize>,
}

impl<'r, 'a, G: Graph, C: PregelComputation> ComputeStep<'r, 'a, G, C> {
    pub(crate) fn new(run: &'r RunContext<'a, G, C>, range: Range<usize>) -> Self {
        Self { run, range }
    }

    /// Vertex ids covered by this step.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Number of vertices covered by this step.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns `true` if the step covers no vertex.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    #[inline]
    pub(crate) fn is_aborted(&self) -> bool {
        self.run.is_aborted()
    }

    /// Bisects the range; the left half gets the smaller share.
    pub(crate) fn split(self) -> (Self, Self) {
        let mid = self.range.start + self.range.len() / 2;
        (
            Self::new(self.run, self.range.start..mid),
            Self::new(self.run, mid..self.range.end),
        )
    }

    /// Runs the phase for every vertex of the range.
    ///
    /// Stops at the next vertex once any step of the phase failed, in which case
    /// the failing step reports the error and this one returns `Ok`.
    pub(crate) fn compute(self) -> Result<()> {
        let graph = self.run.graph.concurrent_copy();
        let result = match self.run.phase {
            Phase::Init => self.init_vertices(&graph),
            Phase::Compute => self.compute_vertices(&graph),
        };
        trace!(
            phase = %self.run.phase,
            superstep = self.run.superstep,
            start = self.range.start,
            end = self.range.end,
            ok = result.is_ok(),
            "compute step finished"
        );
        result
    }

    fn init_vertices(&self, graph: &G) -> Result<()> {
        let run = self.run;
        let mut ctx = InitContext::new(self.vertex_context(graph));
        for (i, node) in self.range.clone().enumerate() {
            if self.should_stop(i)? {
                break;
            }
            ctx.move_to(node);
            run.computation
                .init(&mut ctx)
                .map_err(|source| self.fail(source))?;
        }
        Ok(())
    }

    fn compute_vertices(&self, graph: &G) -> Result<()> {
        let run = self.run;
        let RunBuffers {
            messenger,
            vote_bits,
            active,
            ..
        } = run.buffers;
        let mut ctx = ComputeContext::new(self.vertex_context(graph), messenger, vote_bits, run.superstep);
        let mut invocations = 0;
        let mut result = Ok(());
        for (i, node) in self.range.clone().enumerate() {
            match self.should_stop(i) {
                Ok(false) => {}
                Ok(true) => break,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
            if !active.get(node) {
                // Only the asynchronous messenger delivers into a running superstep.
                if !messenger.has_messages(node) {
                    continue;
                }
                vote_bits.clear(node);
            }
            ctx.move_to(node);
            invocations += 1;
            if let Err(source) = run.computation.compute(&mut ctx, messenger.messages(node)) {
                result = Err(self.fail(source));
                break;
            }
        }
        let (messages_sent, newly_halted) = ctx.counters();
        run.counters.record(invocations, messages_sent, newly_halted);
        result
    }

    fn vertex_context<'g>(&self, graph: &'g G) -> VertexContext<'g, G>
    where
        'r: 'g,
    {
        let run = self.run;
        VertexContext::new(graph, &run.buffers.node_values, run.config, run.termination)
    }

    /// Returns `Ok(true)` if a sibling failed, `Err` if termination was signalled.
    #[inline]
    fn should_stop(&self, visited: usize) -> Result<bool> {
        if self.run.is_aborted() {
            return Ok(true);
        }
        if visited % TERMINATION_CHECK_INTERVAL == 0 && self.run.termination.is_terminated() {
            self.run.abort.store(true, Ordering::Relaxed);
            return Err(PregelError::Terminated {
                superstep: self.run.superstep,
            });
        }
        Ok(false)
    }

    #[cold]
    fn fail(&self, source: ComputeError) -> PregelError {
        self.run.abort.store(true, Ordering::Relaxed);
        PregelError::Computation {
            phase: self.run.phase,
            superstep: self.run.superstep,
            vertices: self.range.clone(),
            source,
        }
    }
}
