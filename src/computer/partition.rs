//! Contiguous vertex ranges.

use core::ops::Range;

/// A contiguous, possibly empty range of vertex ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    start: usize,
    node_count: usize,
}

impl Partition {
    /// Creates the partition `start..start + node_count`.
    pub const fn new(start: usize, node_count: usize) -> Self {
        Self { start, node_count }
    }

    /// First vertex id.
    #[inline]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Number of vertices.
    #[inline]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// One past the last vertex id.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.node_count
    }

    /// Returns `true` if the partition holds no vertex.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// The vertex ids as a range.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Splits `0..node_count` into exactly `count` contiguous partitions.
    ///
    /// Sizes differ by at most one; the first `node_count % count` partitions
    /// get the extra vertex. Partitions are empty when `count > node_count`.
    ///
    /// # Panics
    /// Panics if `count == 0`.
    pub fn split(node_count: usize, count: usize) -> Vec<Partition> {
        assert!(count > 0, "partition count must be > 0");
        let (base, remainder) = (node_count / count, node_count % count);
        let mut start = 0;
        (0..count)
            .map(|i| {
                let len = base + usize::from(i < remainder);
                let partition = Partition::new(start, len);
                start += len;
                partition
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_balances_remainder() {
        let parts = Partition::split(10, 4);
        let sizes: Vec<_> = parts.iter().map(Partition::node_count).collect();
        assert_eq!(sizes, [3, 3, 2, 2]);
        assert_eq!(parts[3].range(), 8..10);
    }

    #[test]
    fn split_more_partitions_than_vertices() {
        let parts = Partition::split(2, 5);
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().filter(|p| p.is_empty()).count(), 3);
    }

    #[test]
    #[should_panic(expected = "partition count must be > 0")]
    fn split_into_zero_partitions_panics() {
        let _ = Partition::split(3, 0);
    }

    proptest! {
        #[test]
        fn split_covers_every_vertex_once(node_count in 0usize..5_000, count in 1usize..64) {
            let parts = Partition::split(node_count, count);
            prop_assert_eq!(parts.len(), count);
            let mut expected_start = 0;
            for p in &parts {
                prop_assert_eq!(p.start(), expected_start);
                expected_start = p.end();
            }
            prop_assert_eq!(expected_start, node_count);
            let max = parts.iter().map(Partition::node_count).max().unwrap_or(0);
            let min = parts.iter().map(Partition::node_count).min().unwrap_or(0);
            prop_assert!(max - min <= 1);
        }
    }
}
