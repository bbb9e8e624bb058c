//! Superstep loop: convergence, the iteration cap, vote bits and message visibility.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use pregel::schema::{ValueType, Visibility};
use pregel::{
    ComputeContext, ComputeResult, Control, CsrGraph, Graph, MasterComputeContext, Messages, Pregel,
    PregelComputation, PregelConfig, PregelSchema, RunState,
};

fn config(max_iterations: usize) -> PregelConfig {
    PregelConfig::builder()
        .max_iterations(max_iterations)
        .concurrency(2)
        .build()
        .unwrap()
}

fn value_schema() -> PregelSchema {
    PregelSchema::builder()
        .add("value", ValueType::Long, Visibility::Public)
        .build()
}

/// Vertex 0 seeds a counter of 1. Every receiver adds it to its value and
/// forwards it; a vertex votes to halt only in supersteps without messages.
struct ForwardCounter;

impl PregelComputation for ForwardCounter {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        if ctx.is_initial_superstep() && ctx.node_id() == 0 {
            ctx.send_to_neighbors(1.0);
        }
        let mut received = false;
        for counter in messages {
            received = true;
            ctx.set_long("value", ctx.long_value("value") + counter as i64);
            ctx.send_to_neighbors(counter);
        }
        if !received {
            ctx.vote_to_halt();
        }
        Ok(())
    }
}

#[test]
fn chain_of_five_converges_after_five_supersteps() {
    for use_fork_join in [false, true] {
        let graph = CsrGraph::from_edges(5, [(0, 1), (1, 2), (2, 3), (3, 4)]);
        let config = PregelConfig::builder()
            .max_iterations(10)
            .concurrency(2)
            .use_fork_join(use_fork_join)
            .fork_join_threshold(1)
            .build()
            .unwrap();
        let mut pregel = Pregel::create(graph, config, ForwardCounter).unwrap();
        let result = pregel.run().unwrap();

        assert_eq!(result.ran_iterations, 5);
        assert!(result.did_converge);
        assert_eq!(pregel.state(), RunState::Converged);
        assert_eq!(result.node_values.long_value("value", 4), 1);
        assert_eq!(result.node_values.long_value("value", 0), 0);
        for node in 1..5 {
            assert_eq!(result.node_values.long_value("value", node), 1);
        }
    }
}

/// Never votes to halt.
struct Restless;

impl PregelComputation for Restless {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
        ctx.set_long("value", ctx.long_value("value") + 1);
        Ok(())
    }
}

#[test]
fn never_halting_runs_exactly_max_iterations() {
    let mut pregel = Pregel::create(CsrGraph::from_edges(10, []), config(7), Restless).unwrap();
    let result = pregel.run().unwrap();
    assert_eq!(result.ran_iterations, 7);
    assert!(!result.did_converge);
    assert_eq!(pregel.state(), RunState::ReachedMaxIterations);
    assert_eq!(result.node_values.long_value("value", 9), 7);
}

#[test]
fn single_iteration_cap() {
    let mut pregel = Pregel::create(CsrGraph::from_edges(3, []), config(1), Restless).unwrap();
    let result = pregel.run().unwrap();
    assert_eq!(result.ran_iterations, 1);
    assert!(!result.did_converge);
}

/// Every vertex votes to halt in superstep `k`.
struct HaltAfter(usize);

impl PregelComputation for HaltAfter {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
        if ctx.superstep() == self.0 {
            ctx.vote_to_halt();
        }
        Ok(())
    }
}

#[test]
fn halting_after_k_supersteps_converges_with_k_iterations() {
    for k in 1..6 {
        let mut pregel = Pregel::create(CsrGraph::from_edges(50, []), config(10), HaltAfter(k)).unwrap();
        let result = pregel.run().unwrap();
        assert_eq!(result.ran_iterations, k);
        assert!(result.did_converge);
    }
}

#[test]
fn ran_iterations_never_exceeds_max() {
    for max in 1..8 {
        for k in 1..10 {
            let mut pregel = Pregel::create(CsrGraph::from_edges(4, []), config(max), HaltAfter(k)).unwrap();
            let result = pregel.run().unwrap();
            assert!(result.ran_iterations <= max);
            assert_eq!(result.did_converge, k < max);
            assert_eq!(result.ran_iterations, k.min(max));
        }
    }
}

/// Stops through master compute after superstep 2.
struct MasterStops;

impl PregelComputation for MasterStops {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    fn compute<G: Graph>(&self, _ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
        Ok(())
    }

    fn master_compute<G: Graph>(&self, ctx: &mut MasterComputeContext<'_, G>) -> ComputeResult<Control> {
        let total = i64::try_from(ctx.superstep())?;
        ctx.set_long("value", 0, total);
        Ok(if ctx.superstep() == 2 { Control::Halt } else { Control::Continue })
    }
}

#[test]
fn master_compute_can_stop_the_run() {
    let mut pregel = Pregel::create(CsrGraph::from_edges(8, []), config(20), MasterStops).unwrap();
    let result = pregel.run().unwrap();
    assert_eq!(result.ran_iterations, 2);
    assert!(result.did_converge);
    assert_eq!(result.node_values.long_value("value", 0), 2);
}

/// Records compute invocations per (superstep, vertex) on the graph `0 -> 1`, 3 vertices.
///
/// Vertex 1 halts in superstep 0. Vertex 0 messages it in superstep 1.
struct Reawaken {
    supersteps: usize,
    invocations: Vec<AtomicUsize>,
    received: Mutex<Vec<(usize, usize, f64)>>,
}

impl Reawaken {
    fn new(supersteps: usize) -> Self {
        Self {
            supersteps,
            invocations: (0..supersteps * 3).map(|_| AtomicUsize::new(0)).collect(),
            received: Mutex::new(Vec::new()),
        }
    }

    fn count(&self, superstep: usize, node: usize) -> usize {
        self.invocations[superstep * 3 + node].load(Ordering::SeqCst)
    }
}

impl PregelComputation for Reawaken {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        let (superstep, node) = (ctx.superstep(), ctx.node_id());
        self.invocations[superstep * 3 + node].fetch_add(1, Ordering::SeqCst);
        for message in messages {
            self.received.lock().unwrap().push((superstep, node, message));
        }
        match node {
            0 if superstep == 1 => ctx.send_to(1, 42.0),
            1 => ctx.vote_to_halt(),
            _ => {}
        }
        Ok(())
    }
}

#[test]
fn halted_vertex_wakes_up_on_message() {
    let computation = Reawaken::new(4);
    let graph = CsrGraph::from_edges(3, [(0, 1)]);
    let mut pregel = Pregel::create(graph, config(computation.supersteps), &computation).unwrap();
    let result = pregel.run().unwrap();
    drop(pregel);
    assert_eq!(result.ran_iterations, 4);
    assert!(!result.did_converge);

    assert_eq!(computation.count(0, 1), 1, "everyone runs in superstep 0");
    assert_eq!(computation.count(1, 1), 0, "halted without messages");
    assert_eq!(computation.count(2, 1), 1, "woken up by the message sent in superstep 1");
    assert_eq!(computation.count(3, 1), 0, "halted again");
    for superstep in 0..4 {
        assert_eq!(computation.count(superstep, 0), 1);
        assert_eq!(computation.count(superstep, 2), 1);
    }
    assert_eq!(*computation.received.lock().unwrap(), vec![(2, 1, 42.0)]);
}

/// Vertex 0 messages vertex 2 in superstep 0 and vertex 2 records what it sees.
struct SameSuperstep {
    seen_in_superstep_zero: AtomicUsize,
}

impl PregelComputation for SameSuperstep {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        value_schema()
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, messages: Messages<'_>) -> ComputeResult {
        if ctx.is_initial_superstep() {
            match ctx.node_id() {
                0 => ctx.send_to(2, 1.0),
                2 => {
                    self.seen_in_superstep_zero
                        .fetch_add(messages.count(), Ordering::SeqCst);
                }
                _ => {}
            }
        }
        ctx.vote_to_halt();
        Ok(())
    }
}

#[test]
fn synchronous_messages_wait_for_next_superstep() {
    let computation = SameSuperstep {
        seen_in_superstep_zero: AtomicUsize::new(0),
    };
    let config = PregelConfig::builder().concurrency(1).build().unwrap();
    let mut pregel = Pregel::create(CsrGraph::from_edges(3, []), config, &computation).unwrap();
    let result = pregel.run().unwrap();
    drop(pregel);
    assert_eq!(computation.seen_in_superstep_zero.load(Ordering::SeqCst), 0);
    // Vertex 2 is woken up in superstep 1 by the pending message.
    assert_eq!(result.ran_iterations, 1);
}

#[test]
fn asynchronous_messages_can_arrive_in_same_superstep() {
    let computation = SameSuperstep {
        seen_in_superstep_zero: AtomicUsize::new(0),
    };
    // One partition visits vertices in ascending order, so 0 sends before 2 runs.
    let config = PregelConfig::builder()
        .concurrency(1)
        .is_asynchronous(true)
        .build()
        .unwrap();
    let mut pregel = Pregel::create(CsrGraph::from_edges(3, []), config, &computation).unwrap();
    let result = pregel.run().unwrap();
    drop(pregel);
    assert_eq!(computation.seen_in_superstep_zero.load(Ordering::SeqCst), 1);
    assert_eq!(result.ran_iterations, 0);
    assert!(result.did_converge);
}
