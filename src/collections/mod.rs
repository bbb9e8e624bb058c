//! Fixed-length storage sized for huge vertex counts.

pub mod huge_array;

pub use huge_array::{HugeAtomicDoubleArray, HugeAtomicLongArray, HugeObjectArray};
