//! Failure propagation: user errors, panics and lifecycle misuse.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use pregel::error::Phase;
use pregel::schema::{ValueType, Visibility};
use pregel::{
    ComputeContext, ComputeResult, Control, CsrGraph, Graph, InitContext, MasterComputeContext, Messages, Pregel,
    PregelComputation, PregelConfig, PregelError, PregelSchema, RunState,
};

#[derive(Default)]
struct FailAt {
    init_node: Option<usize>,
    compute_at: Option<(usize, usize)>,
    master_at: Option<usize>,
    panic_at: Option<usize>,
    invocations: AtomicUsize,
}

impl PregelComputation for FailAt {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add("value", ValueType::Double, Visibility::Public)
            .build()
    }

    fn init<G: Graph>(&self, ctx: &mut InitContext<'_, G>) -> ComputeResult {
        if self.init_node == Some(ctx.node_id()) {
            return Err("bad initial value".into());
        }
        Ok(())
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if self.compute_at == Some((ctx.superstep(), ctx.node_id())) {
            return Err(format!("vertex {} diverged", ctx.node_id()).into());
        }
        if self.panic_at == Some(ctx.node_id()) {
            panic!("vertex program bug");
        }
        Ok(())
    }

    fn master_compute<G: Graph>(&self, ctx: &mut MasterComputeContext<'_, G>) -> ComputeResult<Control> {
        if self.master_at == Some(ctx.superstep()) {
            return Err("aggregate overflow".into());
        }
        Ok(Control::Continue)
    }
}

fn config(use_fork_join: bool) -> PregelConfig {
    PregelConfig::builder()
        .max_iterations(10)
        .concurrency(4)
        .use_fork_join(use_fork_join)
        .fork_join_threshold(16)
        .build()
        .unwrap()
}

#[test]
fn compute_error_reports_superstep_and_range() {
    for use_fork_join in [false, true] {
        let computation = FailAt {
            compute_at: Some((2, 77)),
            ..FailAt::default()
        };
        let mut pregel = Pregel::create(CsrGraph::from_edges(200, []), config(use_fork_join), computation).unwrap();
        let err = pregel.run().unwrap_err();
        match &err {
            PregelError::Computation {
                phase,
                superstep,
                vertices,
                source,
            } => {
                assert_eq!(*phase, Phase::Compute);
                assert_eq!(*superstep, 2);
                assert!(vertices.contains(&77), "{vertices:?} should contain 77");
                assert_eq!(source.to_string(), "vertex 77 diverged");
            }
            other => panic!("expected computation error, got {other:?}"),
        }
        assert_eq!(err.superstep(), Some(2));
        assert!(err.to_string().contains("superstep 2"));
        assert_eq!(pregel.state(), RunState::Failed);
        pregel.release();
        pregel.release();
    }
}

#[test]
fn init_error_is_reported_as_init_phase() {
    let computation = FailAt {
        init_node: Some(3),
        ..FailAt::default()
    };
    let mut pregel = Pregel::create(CsrGraph::from_edges(10, []), config(false), &computation).unwrap();
    let err = pregel.run().unwrap_err();
    assert!(matches!(
        err,
        PregelError::Computation {
            phase: Phase::Init,
            superstep: 0,
            ..
        }
    ));
    drop(pregel);
    assert_eq!(computation.invocations.load(Ordering::Relaxed), 0, "no superstep may run");
}

#[test]
fn master_compute_error_aborts_the_run() {
    let computation = FailAt {
        master_at: Some(1),
        ..FailAt::default()
    };
    let mut pregel = Pregel::create(CsrGraph::from_edges(10, []), config(false), &computation).unwrap();
    let err = pregel.run().unwrap_err();
    assert!(matches!(err, PregelError::MasterCompute { superstep: 1, .. }));
    drop(pregel);
    assert_eq!(computation.invocations.load(Ordering::Relaxed), 20);
}

#[test]
fn failure_stops_sibling_work() {
    let node_count = 1_000_000;
    let computation = FailAt {
        compute_at: Some((0, 0)),
        ..FailAt::default()
    };
    let config = PregelConfig::builder()
        .concurrency(2)
        .use_fork_join(true)
        .fork_join_threshold(1_000)
        .build()
        .unwrap();
    let mut pregel = Pregel::create(CsrGraph::from_edges(node_count, []), config, &computation).unwrap();
    assert!(pregel.run().is_err());
    drop(pregel);
    assert!(computation.invocations.load(Ordering::Relaxed) < node_count);
}

#[test]
#[should_panic(expected = "vertex program bug")]
fn panics_in_vertex_programs_propagate() {
    let computation = FailAt {
        panic_at: Some(5),
        ..FailAt::default()
    };
    let mut pregel = Pregel::create(CsrGraph::from_edges(10, []), config(true), computation).unwrap();
    let _ = pregel.run();
}

#[test]
fn panicking_run_moves_to_failed() {
    for use_fork_join in [false, true] {
        let computation = FailAt {
            panic_at: Some(5),
            ..FailAt::default()
        };
        let mut pregel = Pregel::create(CsrGraph::from_edges(10, []), config(use_fork_join), computation).unwrap();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pregel.run()));
        assert!(outcome.is_err());
        assert_eq!(pregel.state(), RunState::Failed);
        assert!(matches!(pregel.run(), Err(PregelError::InvalidState { .. })));
        pregel.release();
        assert_eq!(pregel.state(), RunState::Released);
    }
}

/// Sends to a vertex id outside the graph.
struct SendsOutOfRange;

impl PregelComputation for SendsOutOfRange {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::default()
    }

    fn compute<G: Graph>(&self, ctx: &mut ComputeContext<'_, G>, _messages: Messages<'_>) -> ComputeResult {
        ctx.send_to(ctx.node_count(), 1.0);
        Ok(())
    }
}

#[test]
#[should_panic(expected = "out of bounds")]
fn sending_out_of_range_is_a_contract_violation() {
    let config = PregelConfig::builder().concurrency(1).build().unwrap();
    let mut pregel = Pregel::create(CsrGraph::from_edges(2, []), config, SendsOutOfRange).unwrap();
    let _ = pregel.run();
}

#[test]
fn out_of_range_send_fails_the_run() {
    let config = PregelConfig::builder().concurrency(2).build().unwrap();
    let mut pregel = Pregel::create(CsrGraph::from_edges(3, []), config, SendsOutOfRange).unwrap();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pregel.run()));
    assert!(outcome.is_err());
    assert_eq!(pregel.state(), RunState::Failed);
}

#[test]
fn configuration_errors_name_the_field() {
    let err = PregelConfig::builder().max_iterations(0).build().unwrap_err();
    assert!(matches!(
        err,
        PregelError::InvalidConfiguration {
            field: "max_iterations",
            ..
        }
    ));
    assert!(err.to_string().contains("max_iterations"));
    assert_eq!(err.superstep(), None);
}
