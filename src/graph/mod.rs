//! The read-only graph interface consumed by the engine.
//!
//! The engine never mutates topology. Node ids are dense `usize` values in
//! `0..node_count()`; `to_original_node_id`/`to_mapped_node_id` translate to
//! and from the ids the graph was loaded with.

pub mod csr_graph;

pub use csr_graph::CsrGraph;

/// A read-only, directed graph with dense node ids.
///
/// Implementations must be cheap to copy through `concurrent_copy`: the engine
/// hands one copy to every unit of work so that cursors or caches inside an
/// implementation never have to be shared across threads.
pub trait Graph: Send + Sync {
    /// Number of nodes. Valid node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Number of directed relationships.
    fn relationship_count(&self) -> usize;

    /// Out-degree of `node`.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    fn degree(&self, node: usize) -> usize;

    /// Calls `consumer` with every out-neighbor of `node` until it returns `false`.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    fn for_each_relationship<F>(&self, node: usize, consumer: F)
    where
        F: FnMut(usize) -> bool;

    /// Like `for_each_relationship`, also passing the relationship weight.
    ///
    /// Graphs without weights report `fallback` for every relationship.
    fn for_each_relationship_with_weight<F>(&self, node: usize, fallback: f64, mut consumer: F)
    where
        F: FnMut(usize, f64) -> bool,
    {
        self.for_each_relationship(node, |target| consumer(target, fallback));
    }

    /// Returns `true` if relationships carry weights.
    fn has_relationship_weights(&self) -> bool {
        false
    }

    /// Returns a handle for use by a single worker.
    fn concurrent_copy(&self) -> Self
    where
        Self: Sized;

    /// Maps an original id to the dense node id, if the node exists.
    fn to_mapped_node_id(&self, original: u64) -> Option<usize>;

    /// Maps a dense node id back to the id the graph was loaded with.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    fn to_original_node_id(&self, node: usize) -> u64;
}
