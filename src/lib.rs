//! # `pregel` - Bulk-Synchronous-Parallel Graph Computation
//!
//! A vertex-centric computation engine for iterative graph algorithms over
//! huge in-memory graphs in a single process. Algorithms describe what one
//! vertex does when it wakes up and receives messages; the engine supplies
//! scheduling, message delivery and convergence detection.
//!
//! ## Execution Model
//!
//! A run is a sequence of supersteps. In every superstep:
//! 1. each *active* vertex runs [`PregelComputation::compute`] once, in parallel
//! 2. [`PregelComputation::master_compute`] runs once, on the calling thread
//! 3. the run stops if every vertex voted to halt and no message is pending,
//!    or when `max_iterations` supersteps have run
//!
//! A vertex is active if it has not voted to halt, or if it has inbound
//! messages. Receiving a message reactivates a halted vertex.
//!
//! ## Building Blocks
//!
//! - **Vertex values** ([`NodeValues`]): one paged huge array per schema slot
//! - **Vote bits** ([`concurrency::HugeAtomicBitSet`]): one lock-free halt bit per vertex
//! - **Messengers** ([`messages::Messenger`]): synchronous queues, asynchronous
//!   queues, or a reducer combining messages on arrival
//! - **Computers** ([`computer::PregelComputer`]): fork-join bisection or fixed
//!   partitions on a rayon pool
//! - **Orchestrator** ([`Pregel`]): lifecycle state machine and superstep loop
//!
//! ### Concurrency Guarantees
//!
//! - Partitions of a superstep are disjoint, so no two workers write the same
//!   vertex; per-vertex state needs no locks.
//! - Messenger targets and vote bits are updated with atomics, since a vertex
//!   may receive from every partition at once.
//! - The orchestrator waits for every partition before master compute runs,
//!   which orders all sends of superstep `s` before all receives of `s + 1`
//!   for the synchronous and reducing messengers.
//!
//! ## Example
//!
//! ```rust
//! use pregel::algorithms::PageRankPregel;
//! use pregel::{CsrGraph, Pregel, PregelConfig};
//!
//! let graph = CsrGraph::from_edges(3, [(0, 1), (1, 2), (2, 0)]);
//! let config = PregelConfig::builder().max_iterations(100).build().unwrap();
//! let mut pregel = Pregel::create(graph, config, PageRankPregel::default()).unwrap();
//! let result = pregel.run().unwrap();
//!
//! // A directed cycle spreads rank evenly.
//! let rank = result.node_values.double_value("rank", 0);
//! assert!((rank - 1.0 / 3.0).abs() < 1e-3);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod algorithms;
pub mod collections;
pub mod computation;
pub mod computer;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod messages;
pub mod node_value;
pub mod pregel;
pub mod schema;

pub use computation::{Control, PregelComputation};
pub use concurrency::TerminationFlag;
pub use config::PregelConfig;
pub use context::{ComputeContext, InitContext, MasterComputeContext, VertexContext};
pub use error::{ComputeError, ComputeResult, PregelError};
pub use graph::{CsrGraph, Graph};
pub use messages::{Messages, Reducer};
pub use node_value::NodeValues;
pub use pregel::{Pregel, PregelResult, RunState};
pub use schema::PregelSchema;

// Compile-time layout checks relied on by the memory estimations.
const _: () = {
    use core::mem;

    // Empty array slots cost one fat pointer.
    assert!(mem::size_of::<Option<Box<[i64]>>>() == mem::size_of::<Box<[i64]>>());
    assert!(mem::size_of::<Option<Box<[f64]>>>() == 2 * mem::size_of::<usize>());
};
