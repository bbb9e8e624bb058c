//! Lock-free building blocks shared by all partitions of a run.

pub mod bitset;
pub mod termination;

pub use bitset::HugeAtomicBitSet;
pub use termination::TerminationFlag;
