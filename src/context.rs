//! Views handed to vertex programs.
//!
//! - [`InitContext`] - per vertex, once before superstep 0
//! - [`ComputeContext`] - per active vertex, once per superstep
//! - [`MasterComputeContext`] - once per superstep, single-threaded
//!
//! Both per-vertex contexts dereference to [`VertexContext`], which carries the
//! graph and value accessors scoped to the current vertex. A per-vertex context
//! only ever writes the values of its own vertex; partitions never overlap, so
//! no two contexts write the same vertex concurrently.

use core::cell::Cell;
use core::ops::{Deref, DerefMut};

use crate::concurrency::{HugeAtomicBitSet, TerminationFlag};
use crate::config::PregelConfig;
use crate::graph::Graph;
use crate::messages::Messenger;
use crate::node_value::NodeValues;

/// Graph and value access for the vertex currently being processed.
///
/// Value accessors panic on unknown keys and on type mismatches.
pub struct VertexContext<'a, G> {
    graph: &'a G,
    node_values: &'a NodeValues,
    config: &'a PregelConfig,
    termination: &'a TerminationFlag,
    node: usize,
}

impl<'a, G: Graph> VertexContext<'a, G> {
    pub(crate) fn new(
        graph: &'a G,
        node_values: &'a NodeValues,
        config: &'a PregelConfig,
        termination: &'a TerminationFlag,
    ) -> Self {
        Self {
            graph,
            node_values,
            config,
            termination,
            node: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn move_to(&mut self, node: usize) {
        self.node = node;
    }

    /// Id of the current vertex.
    #[inline(always)]
    pub fn node_id(&self) -> usize {
        self.node
    }

    /// Number of vertices in the graph.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of relationships in the graph.
    #[inline]
    pub fn relationship_count(&self) -> usize {
        self.graph.relationship_count()
    }

    /// Out-degree of the current vertex.
    #[inline]
    pub fn degree(&self) -> usize {
        self.graph.degree(self.node)
    }

    /// Calls `f` with every out-neighbor of the current vertex.
    #[inline]
    pub fn for_each_neighbor(&self, mut f: impl FnMut(usize)) {
        self.graph.for_each_relationship(self.node, |target| {
            f(target);
            true
        });
    }

    /// Calls `f` with every out-neighbor and its relationship weight.
    ///
    /// Unweighted graphs report `fallback`.
    #[inline]
    pub fn for_each_weighted_neighbor(&self, fallback: f64, mut f: impl FnMut(usize, f64)) {
        self.graph
            .for_each_relationship_with_weight(self.node, fallback, |target, weight| {
                f(target, weight);
                true
            });
    }

    /// Id the graph was loaded with for `node`.
    #[inline]
    pub fn to_original_id(&self, node: usize) -> u64 {
        self.graph.to_original_node_id(node)
    }

    /// Dense id of the vertex loaded as `original`, if any.
    #[inline]
    pub fn to_mapped_id(&self, original: u64) -> Option<usize> {
        self.graph.to_mapped_node_id(original)
    }

    /// The run configuration.
    #[inline]
    pub fn config(&self) -> &PregelConfig {
        self.config
    }

    /// Returns `true` once the run was asked to stop.
    ///
    /// Long-running vertex programs may poll this and return early.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.termination.is_terminated()
    }

    /// Reads a `Long` slot of the current vertex.
    #[inline]
    pub fn long_value(&self, key: &str) -> i64 {
        self.node_values.long_value(key, self.node)
    }

    /// Reads a `Double` slot of the current vertex.
    #[inline]
    pub fn double_value(&self, key: &str) -> f64 {
        self.node_values.double_value(key, self.node)
    }

    /// Reads a `LongArray` slot of the current vertex; `None` until set.
    #[inline]
    pub fn long_array_value(&self, key: &str) -> Option<&[i64]> {
        self.node_values.long_array_value(key, self.node)
    }

    /// Reads a `DoubleArray` slot of the current vertex; `None` until set.
    #[inline]
    pub fn double_array_value(&self, key: &str) -> Option<&[f64]> {
        self.node_values.double_array_value(key, self.node)
    }

    /// Writes a `Long` slot of the current vertex.
    #[inline]
    pub fn set_long(&self, key: &str, value: i64) {
        self.node_values.set_long(key, self.node, value);
    }

    /// Writes a `Double` slot of the current vertex.
    #[inline]
    pub fn set_double(&self, key: &str, value: f64) {
        self.node_values.set_double(key, self.node, value);
    }

    /// Writes a `LongArray` slot of the current vertex.
    pub fn set_long_array(&mut self, key: &str, value: Vec<i64>) {
        // SAFETY: only this context writes `self.node` during the superstep, and
        // `&mut self` ends every slice it handed out for the vertex.
        unsafe { self.node_values.set_long_array_shared(key, self.node, value) }
    }

    /// Writes a `DoubleArray` slot of the current vertex.
    pub fn set_double_array(&mut self, key: &str, value: Vec<f64>) {
        // SAFETY: see `set_long_array`.
        unsafe { self.node_values.set_double_array_shared(key, self.node, value) }
    }
}

/// Context of the per-vertex `init` hook.
pub struct InitContext<'a, G> {
    vertex: VertexContext<'a, G>,
}

impl<'a, G: Graph> InitContext<'a, G> {
    pub(crate) fn new(vertex: VertexContext<'a, G>) -> Self {
        Self { vertex }
    }

    #[inline(always)]
    pub(crate) fn move_to(&mut self, node: usize) {
        self.vertex.move_to(node);
    }
}

impl<'a, G> Deref for InitContext<'a, G> {
    type Target = VertexContext<'a, G>;

    fn deref(&self) -> &Self::Target {
        &self.vertex
    }
}

impl<G> DerefMut for InitContext<'_, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vertex
    }
}

/// Context of the per-vertex `compute` hook.
///
/// Not `Sync`: one context is owned by one compute step.
pub struct ComputeContext<'a, G> {
    vertex: VertexContext<'a, G>,
    messenger: &'a Messenger,
    vote_bits: &'a HugeAtomicBitSet,
    superstep: usize,
    messages_sent: Cell<usize>,
    newly_halted: usize,
}

impl<'a, G: Graph> ComputeContext<'a, G> {
    pub(crate) fn new(
        vertex: VertexContext<'a, G>,
        messenger: &'a Messenger,
        vote_bits: &'a HugeAtomicBitSet,
        superstep: usize,
    ) -> Self {
        Self {
            vertex,
            messenger,
            vote_bits,
            superstep,
            messages_sent: Cell::new(0),
            newly_halted: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn move_to(&mut self, node: usize) {
        self.vertex.move_to(node);
    }

    /// Messages sent and halt transitions recorded through this context.
    pub(crate) fn counters(&self) -> (usize, usize) {
        (self.messages_sent.get(), self.newly_halted)
    }

    /// Index of the running superstep, starting at 0.
    #[inline(always)]
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    /// Returns `true` in superstep 0.
    #[inline(always)]
    pub fn is_initial_superstep(&self) -> bool {
        self.superstep == 0
    }

    /// Sends `value` to `target`.
    ///
    /// # Panics
    /// Panics if `target >= node_count()`.
    #[inline]
    pub fn send_to(&self, target: usize, value: f64) {
        self.messenger.send_to(target, value);
        self.messages_sent.set(self.messages_sent.get() + 1);
    }

    /// Sends `value` to every out-neighbor of the current vertex.
    pub fn send_to_neighbors(&self, value: f64) {
        self.vertex.for_each_neighbor(|target| self.send_to(target, value));
    }

    /// Marks the current vertex inactive until it receives a message.
    #[inline]
    pub fn vote_to_halt(&mut self) {
        if !self.vote_bits.get_and_set(self.vertex.node_id()) {
            self.newly_halted += 1;
        }
    }
}

impl<'a, G> Deref for ComputeContext<'a, G> {
    type Target = VertexContext<'a, G>;

    fn deref(&self) -> &Self::Target {
        &self.vertex
    }
}

impl<G> DerefMut for ComputeContext<'_, G> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vertex
    }
}

/// Context of the `master_compute` hook.
///
/// Runs alone between supersteps and may read or write any vertex.
pub struct MasterComputeContext<'a, G> {
    graph: &'a G,
    node_values: &'a mut NodeValues,
    config: &'a PregelConfig,
    termination: &'a TerminationFlag,
    superstep: usize,
}

impl<'a, G: Graph> MasterComputeContext<'a, G> {
    pub(crate) fn new(
        graph: &'a G,
        node_values: &'a mut NodeValues,
        config: &'a PregelConfig,
        termination: &'a TerminationFlag,
        superstep: usize,
    ) -> Self {
        Self {
            graph,
            node_values,
            config,
            termination,
            superstep,
        }
    }

    /// Index of the superstep that just finished.
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    /// Returns `true` if the finished superstep is superstep 0.
    pub fn is_initial_superstep(&self) -> bool {
        self.superstep == 0
    }

    /// Number of vertices in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The graph.
    pub fn graph(&self) -> &G {
        self.graph
    }

    /// The run configuration.
    pub fn config(&self) -> &PregelConfig {
        self.config
    }

    /// Returns `true` once the run was asked to stop.
    pub fn is_terminated(&self) -> bool {
        self.termination.is_terminated()
    }

    /// Read access to every vertex value.
    pub fn node_values(&self) -> &NodeValues {
        self.node_values
    }

    /// Write access to every vertex value.
    pub fn node_values_mut(&mut self) -> &mut NodeValues {
        self.node_values
    }

    /// Reads a `Long` slot of `node`.
    pub fn long_value(&self, key: &str, node: usize) -> i64 {
        self.node_values.long_value(key, node)
    }

    /// Reads a `Double` slot of `node`.
    pub fn double_value(&self, key: &str, node: usize) -> f64 {
        self.node_values.double_value(key, node)
    }

    /// Writes a `Long` slot of `node`.
    pub fn set_long(&self, key: &str, node: usize, value: i64) {
        self.node_values.set_long(key, node, value);
    }

    /// Writes a `Double` slot of `node`.
    pub fn set_double(&self, key: &str, node: usize, value: f64) {
        self.node_values.set_double(key, node, value);
    }
}
