//! A huge, word-packed atomic bitset.
//!
//! Used as the per-vertex halt bits of a run. Every operation is lock-free and
//! may be called concurrently from any number of partitions.

use core::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

const WORD_BITS: usize = u64::BITS as usize;
/// Words visited by one task of the whole-set passes.
const PARALLEL_MIN_LEN: usize = 1 << 10;

/// A fixed-size, word-packed atomic bitset.
pub struct HugeAtomicBitSet {
    bits: usize,
    words: Box<[AtomicU64]>,
}

impl HugeAtomicBitSet {
    /// Creates a new bitset with `bits` bits, all cleared.
    pub fn new(bits: usize) -> Self {
        let words = (0..bits.div_ceil(WORD_BITS))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { bits, words }
    }

    /// Number of bits.
    #[inline]
    pub fn size(&self) -> usize {
        self.bits
    }

    /// Returns whether `bit` is set.
    ///
    /// # Panics
    /// Panics if `bit >= size()`.
    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        let (word, mask) = self.word_mask(bit);
        (self.words[word].load(Ordering::Acquire) & mask) != 0
    }

    /// Sets `bit`.
    ///
    /// # Panics
    /// Panics if `bit >= size()`.
    #[inline]
    pub fn set(&self, bit: usize) {
        let (word, mask) = self.word_mask(bit);
        self.words[word].fetch_or(mask, Ordering::AcqRel);
    }

    /// Sets `bit` and returns its previous state.
    ///
    /// Exactly one of several racing callers observes `false`, which makes this
    /// suitable for counting first transitions.
    ///
    /// # Panics
    /// Panics if `bit >= size()`.
    #[inline]
    pub fn get_and_set(&self, bit: usize) -> bool {
        let (word, mask) = self.word_mask(bit);
        let prev = self.words[word].fetch_or(mask, Ordering::AcqRel);
        (prev & mask) != 0
    }

    /// Clears `bit`.
    ///
    /// # Panics
    /// Panics if `bit >= size()`.
    #[inline]
    pub fn clear(&self, bit: usize) {
        let (word, mask) = self.word_mask(bit);
        // Skip the RMW when the bit is already clear; most active vertices never voted.
        if self.words[word].load(Ordering::Relaxed) & mask != 0 {
            self.words[word].fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// Clears all bits.
    ///
    /// The whole-set passes run on the current rayon pool.
    pub fn clear_all(&self) {
        self.words
            .par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|w| w.store(0, Ordering::Relaxed));
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> usize {
        self.words
            .par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|w| w.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }

    /// Returns `true` if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words
            .par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .all(|w| w.load(Ordering::Acquire) == 0)
    }

    /// Returns `true` if every bit is set.
    pub fn all_set(&self) -> bool {
        self.cardinality() == self.bits
    }

    /// Estimated heap footprint of a bitset with `bits` bits.
    pub fn memory_estimation(bits: usize) -> usize {
        bits.div_ceil(WORD_BITS) * core::mem::size_of::<AtomicU64>()
    }

    #[inline(always)]
    fn word_mask(&self, bit: usize) -> (usize, u64) {
        assert!(
            bit < self.bits,
            "bit {bit} out of bounds for bitset of size {}",
            self.bits
        );
        (bit >> 6, 1u64 << (bit & 63))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let b = HugeAtomicBitSet::new(130);
        assert_eq!(b.size(), 130);
        assert!(!b.get(0));
        b.set(0);
        assert!(b.get(0));
        b.set(129);
        assert_eq!(b.cardinality(), 2);
        b.clear(0);
        assert!(!b.get(0));
        assert_eq!(b.cardinality(), 1);
        b.clear_all();
        assert_eq!(b.cardinality(), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn get_and_set_reports_previous_state() {
        let b = HugeAtomicBitSet::new(10);
        assert!(!b.get_and_set(3));
        assert!(b.get_and_set(3));
        b.clear(3);
        assert!(!b.get_and_set(3));
    }

    #[test]
    fn only_one_racing_caller_sees_first_transition() {
        let b = HugeAtomicBitSet::new(64);
        let firsts = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for bit in 0..64 {
                        if !b.get_and_set(bit) {
                            firsts.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(firsts.load(Ordering::Relaxed), 64);
        assert!(b.all_set());
    }

    #[test]
    fn whole_set_passes_span_many_tasks() {
        let bits = 64 * PARALLEL_MIN_LEN * 5 + 17;
        let b = HugeAtomicBitSet::new(bits);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        pool.install(|| {
            assert!(b.is_empty());
            for bit in (0..bits).step_by(1000) {
                b.set(bit);
            }
            b.set(bits - 1);
            assert_eq!(b.cardinality(), bits.div_ceil(1000) + 1);
            assert!(!b.is_empty());
            b.clear_all();
            assert_eq!(b.cardinality(), 0);
            assert!(b.is_empty());
        });
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_range_bit_panics() {
        HugeAtomicBitSet::new(5).set(5);
    }
}
