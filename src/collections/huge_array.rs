//! Paged, fixed-length arrays sized for billions of elements.
//!
//! Elements are stored in fixed-size pages so that no single allocation has to
//! hold the whole array. Arrays are allocated once with their final length and
//! never grow.
//!
//! Memory layout:
//! - `pages`: boxed slice of pages, each `PAGE_SIZE` elements except the last
//! - index `i` lives at `pages[i >> PAGE_SHIFT][i & PAGE_MASK]`

use core::cell::UnsafeCell;
use core::mem;
use core::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

/// Number of index bits addressing an element within a page.
pub const PAGE_SHIFT: usize = 14;
/// Number of elements per page.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: usize = PAGE_SIZE - 1;

#[inline(always)]
fn page_index(index: usize) -> (usize, usize) {
    (index >> PAGE_SHIFT, index & PAGE_MASK)
}

/// Lengths of the pages backing an array of `size` elements.
fn page_lengths(size: usize) -> impl Iterator<Item = usize> {
    let pages = size.div_ceil(PAGE_SIZE);
    (0..pages).map(move |p| {
        if p + 1 == pages {
            size - p * PAGE_SIZE
        } else {
            PAGE_SIZE
        }
    })
}

/// Estimated heap footprint of a paged array of `size` elements of `elem` bytes.
pub fn estimate_paged_bytes(size: usize, elem: usize) -> usize {
    let pages = size.div_ceil(PAGE_SIZE);
    size.saturating_mul(elem) + pages * mem::size_of::<Box<[u8]>>()
}

/// Paged storage of `AtomicU64` words shared by the typed atomic arrays.
struct AtomicWordPages {
    size: usize,
    pages: Box<[Box<[AtomicU64]>]>,
}

impl AtomicWordPages {
    fn new(size: usize, initial: u64) -> Self {
        let pages = page_lengths(size)
            .map(|len| (0..len).map(|_| AtomicU64::new(initial)).collect())
            .collect();
        Self { size, pages }
    }

    #[inline(always)]
    fn word(&self, index: usize) -> &AtomicU64 {
        assert!(
            index < self.size,
            "index {index} out of bounds for length {}",
            self.size
        );
        let (page, offset) = page_index(index);
        &self.pages[page][offset]
    }

    /// Stores `value` everywhere, one page per task on the current rayon pool.
    fn fill(&self, value: u64) {
        self.pages.par_iter().for_each(|page| {
            for word in page.iter() {
                word.store(value, Ordering::Relaxed);
            }
        });
    }
}

/// A fixed-length array of `i64` values supporting concurrent writers.
///
/// All accessors panic on out-of-range indices.
pub struct HugeAtomicLongArray {
    words: AtomicWordPages,
}

impl HugeAtomicLongArray {
    /// Allocates an array of `size` elements, all set to `initial`.
    pub fn new(size: usize, initial: i64) -> Self {
        Self {
            words: AtomicWordPages::new(size, initial as u64),
        }
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.words.size
    }

    /// Returns the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> i64 {
        self.words.word(index).load(Ordering::Relaxed) as i64
    }

    /// Sets the value at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: i64) {
        self.words.word(index).store(value as u64, Ordering::Relaxed);
    }

    /// Returns the value at `index`, synchronizing with the writer that stored it.
    #[inline]
    pub fn get_acquire(&self, index: usize) -> i64 {
        self.words.word(index).load(Ordering::Acquire) as i64
    }

    /// Replaces the value at `index`, returning the previous value.
    #[inline]
    pub fn swap(&self, index: usize, value: i64) -> i64 {
        self.words.word(index).swap(value as u64, Ordering::AcqRel) as i64
    }

    /// Stores `new` at `index` if the current value equals `current`.
    ///
    /// Returns `Ok(previous)` on success and `Err(actual)` otherwise.
    #[inline]
    pub fn compare_exchange(&self, index: usize, current: i64, new: i64) -> Result<i64, i64> {
        self.words
            .word(index)
            .compare_exchange(current as u64, new as u64, Ordering::AcqRel, Ordering::Acquire)
            .map(|v| v as i64)
            .map_err(|v| v as i64)
    }

    /// Adds `delta` to the value at `index`, returning the previous value.
    #[inline]
    pub fn get_and_add(&self, index: usize, delta: i64) -> i64 {
        self.words.word(index).fetch_add(delta as u64, Ordering::AcqRel) as i64
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: i64) {
        self.words.fill(value as u64);
    }

    /// Estimated heap footprint of an array with `size` elements.
    pub fn memory_estimation(size: usize) -> usize {
        estimate_paged_bytes(size, mem::size_of::<AtomicU64>())
    }
}

/// A fixed-length array of `f64` values supporting concurrent writers.
///
/// Values are stored as their IEEE-754 bit patterns in `AtomicU64` words.
/// All accessors panic on out-of-range indices.
pub struct HugeAtomicDoubleArray {
    words: AtomicWordPages,
}

impl HugeAtomicDoubleArray {
    /// Allocates an array of `size` elements, all set to `initial`.
    pub fn new(size: usize, initial: f64) -> Self {
        Self {
            words: AtomicWordPages::new(size, initial.to_bits()),
        }
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.words.size
    }

    /// Returns the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        f64::from_bits(self.words.word(index).load(Ordering::Relaxed))
    }

    /// Sets the value at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: f64) {
        self.words.word(index).store(value.to_bits(), Ordering::Relaxed);
    }

    /// Atomically replaces the value at `index` with `f(current)`, returning
    /// the previous value.
    ///
    /// `f` may be invoked several times under contention.
    #[inline]
    pub fn update(&self, index: usize, f: impl Fn(f64) -> f64) -> f64 {
        let word = self.words.word(index);
        let mut current = word.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: f64) {
        self.words.fill(value.to_bits());
    }

    /// Estimated heap footprint of an array with `size` elements.
    pub fn memory_estimation(size: usize) -> usize {
        estimate_paged_bytes(size, mem::size_of::<AtomicU64>())
    }
}

/// A fixed-length array of optional owned objects, one slot per index.
///
/// Exclusive mutation goes through `&mut self`. The crate additionally writes
/// through `&self` when it can prove that no other thread touches the same
/// index, which holds for vertex partitions.
pub struct HugeObjectArray<T> {
    size: usize,
    pages: Box<[Box<[UnsafeCell<Option<T>>]>]>,
}

// SAFETY: shared mutation is restricted to `set_shared`, whose contract forbids
// concurrent access to the same slot.
unsafe impl<T: Send + Sync> Sync for HugeObjectArray<T> {}
unsafe impl<T: Send> Send for HugeObjectArray<T> {}

impl<T> HugeObjectArray<T> {
    /// Allocates an array of `size` empty slots.
    pub fn new(size: usize) -> Self {
        let pages = page_lengths(size)
            .map(|len| (0..len).map(|_| UnsafeCell::new(None)).collect())
            .collect();
        Self { size, pages }
    }

    /// Number of slots.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    fn cell(&self, index: usize) -> &UnsafeCell<Option<T>> {
        assert!(
            index < self.size,
            "index {index} out of bounds for length {}",
            self.size
        );
        let (page, offset) = page_index(index);
        &self.pages[page][offset]
    }

    /// Returns the object stored at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        // SAFETY: writers through `&self` never overlap with readers of the same
        // slot (see `set_shared`).
        unsafe { (*self.cell(index).get()).as_ref() }
    }

    /// Stores `value` at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        assert!(
            index < self.size,
            "index {index} out of bounds for length {}",
            self.size
        );
        let (page, offset) = page_index(index);
        *self.pages[page][offset].get_mut() = Some(value);
    }

    /// Stores `value` at `index` through a shared reference.
    ///
    /// # Safety
    /// No other thread may read or write slot `index` for the duration of the
    /// call, and no reference previously returned by `get(index)` may be alive.
    #[inline]
    pub(crate) unsafe fn set_shared(&self, index: usize, value: T) {
        // SAFETY: caller guarantees exclusive access to this slot.
        unsafe { *self.cell(index).get() = Some(value) };
    }

    /// Estimated heap footprint of the slot table with `size` entries.
    pub fn memory_estimation(size: usize) -> usize {
        estimate_paged_bytes(size, mem::size_of::<Option<T>>())
    }
}
