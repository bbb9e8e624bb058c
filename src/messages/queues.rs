//! Lock-free per-vertex message queues.
//!
//! Every vertex owns the head of an intrusive singly-linked list whose cells
//! live in a shared, paged arena:
//! - a send reserves a cell with one `fetch_add` on the arena cursor, writes
//!   the payload, and links the cell in front of the target's head with a
//!   Treiber-style CAS
//! - a receive either walks the list in place or detaches it with one `swap`
//!
//! Cells are never freed individually. The arena is recycled wholesale by
//! `clear`, which the engine only calls between supersteps.

use core::{ptr, slice};
use core::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::collections::HugeAtomicLongArray;

/// Sentinel for an empty list / end of list.
pub(crate) const NIL: i64 = -1;

const DEFAULT_PAGE_SHIFT: u32 = 16;
const DIRECTORY_SHIFT: u32 = 12;
const DIRECTORY_SIZE: usize = 1 << DIRECTORY_SHIFT;
const MAX_DIRECTORIES: usize = 1 << 14;

/// Heads visited by one task of the parallel passes.
const PARALLEL_MIN_LEN: usize = 1 << 12;

struct MessageCell {
    value: AtomicU64,
    next: AtomicU64,
}

impl MessageCell {
    fn empty() -> Self {
        Self {
            value: AtomicU64::new(0),
            next: AtomicU64::new(NIL as u64),
        }
    }
}

/// Paged, append-only storage for message cells.
///
/// Cell `i` lives on page `i >> page_shift`. Pages are reached through a
/// two-level directory: the root holds `MAX_DIRECTORIES` lazily allocated
/// directories of `DIRECTORY_SIZE` lazily allocated pages each, so only the
/// root is paid for up front.
pub(crate) struct MessageArena {
    cursor: AtomicUsize,
    page_shift: u32,
    root: Box<[AtomicPtr<AtomicPtr<MessageCell>>]>,
}

impl MessageArena {
    fn new(page_shift: u32) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            page_shift,
            root: (0..MAX_DIRECTORIES).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
        }
    }

    #[inline]
    fn page_size(&self) -> usize {
        1 << self.page_shift
    }

    fn capacity(&self) -> usize {
        MAX_DIRECTORIES * DIRECTORY_SIZE * self.page_size()
    }

    fn reserve(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }

    fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline]
    fn cell(&self, index: usize) -> &MessageCell {
        let page = index >> self.page_shift;
        let offset = index & (self.page_size() - 1);
        let (directory, slot) = (page >> DIRECTORY_SHIFT, page & (DIRECTORY_SIZE - 1));
        assert!(
            directory < MAX_DIRECTORIES,
            "message buffer capacity of {} messages per superstep exceeded",
            self.capacity()
        );
        let pages = self.directory(directory);
        let mut base = pages[slot].load(Ordering::Acquire);
        if base.is_null() {
            base = install(&pages[slot], self.page_size(), MessageCell::empty);
        }
        // SAFETY: `base` points to a live page of `page_size` cells and
        // `offset < page_size`.
        unsafe { &*base.add(offset) }
    }

    #[inline]
    fn directory(&self, directory: usize) -> &[AtomicPtr<MessageCell>] {
        let mut base = self.root[directory].load(Ordering::Acquire);
        if base.is_null() {
            base = install(&self.root[directory], DIRECTORY_SIZE, || AtomicPtr::new(ptr::null_mut()));
        }
        // SAFETY: installed directories hold exactly `DIRECTORY_SIZE` slots and
        // live until the arena is dropped.
        unsafe { slice::from_raw_parts(base, DIRECTORY_SIZE) }
    }

    fn clear(&self) {
        self.cursor.store(0, Ordering::Release);
    }

    fn allocated_bytes(&self) -> usize {
        let slot = core::mem::size_of::<AtomicPtr<MessageCell>>();
        let page = self.page_size() * core::mem::size_of::<MessageCell>();
        let mut bytes = self.root.len() * slot;
        for directory in self.root.iter() {
            let base = directory.load(Ordering::Relaxed);
            if base.is_null() {
                continue;
            }
            // SAFETY: see `directory`.
            let pages = unsafe { slice::from_raw_parts(base, DIRECTORY_SIZE) };
            let installed = pages.iter().filter(|p| !p.load(Ordering::Relaxed).is_null()).count();
            bytes += DIRECTORY_SIZE * slot + installed * page;
        }
        bytes
    }
}

/// Installs a fresh boxed slice of `len` elements into `slot` unless another
/// thread got there first, and returns the installed pointer.
#[cold]
fn install<T>(slot: &AtomicPtr<T>, len: usize, init: impl Fn() -> T) -> *mut T {
    let fresh: Box<[T]> = (0..len).map(|_| init()).collect();
    let raw = Box::into_raw(fresh).cast::<T>();
    match slot.compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => raw,
        Err(installed) => {
            // SAFETY: `raw` came from `Box::into_raw` above and was never shared.
            unsafe { free(raw, len) };
            installed
        }
    }
}

/// # Safety
/// `raw` must come from `install` with the same `len` and be freed once.
unsafe fn free<T>(raw: *mut T, len: usize) {
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len)));
}

impl Drop for MessageArena {
    fn drop(&mut self) {
        let page_size = self.page_size();
        for directory in self.root.iter_mut() {
            let base = *directory.get_mut();
            if base.is_null() {
                continue;
            }
            // SAFETY: exclusive access; every non-null directory and page was
            // installed by `install` with these lengths and is freed once.
            unsafe {
                for page in slice::from_raw_parts_mut(base, DIRECTORY_SIZE) {
                    let raw = *page.get_mut();
                    if !raw.is_null() {
                        free(raw, page_size);
                    }
                }
                free(base, DIRECTORY_SIZE);
            }
        }
    }
}

/// One list head per vertex plus the arena holding the list cells.
pub(crate) struct MessageQueues {
    heads: HugeAtomicLongArray,
    arena: MessageArena,
}

impl MessageQueues {
    pub(crate) fn new(node_count: usize) -> Self {
        Self::with_page_shift(node_count, DEFAULT_PAGE_SHIFT)
    }

    fn with_page_shift(node_count: usize, page_shift: u32) -> Self {
        Self {
            heads: HugeAtomicLongArray::new(node_count, NIL),
            arena: MessageArena::new(page_shift),
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.heads.size()
    }

    /// Appends `value` to `target`'s queue.
    ///
    /// # Panics
    /// Panics if `target >= node_count()`.
    #[inline]
    pub(crate) fn push(&self, target: usize, value: f64) {
        // Validate before reserving so a bad target does not leak a cell.
        assert!(
            target < self.heads.size(),
            "message target {target} out of bounds for {} vertices",
            self.heads.size()
        );
        let index = self.arena.reserve();
        let cell = self.arena.cell(index);
        cell.value.store(value.to_bits(), Ordering::Relaxed);
        let mut head = self.heads.get_acquire(target);
        loop {
            cell.next.store(head as u64, Ordering::Relaxed);
            match self.heads.compare_exchange(target, head, index as i64) {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Returns the first cell of `node`'s queue without detaching it.
    #[inline]
    pub(crate) fn peek(&self, node: usize) -> i64 {
        self.heads.get_acquire(node)
    }

    /// Detaches `node`'s whole queue, returning its first cell.
    #[inline]
    pub(crate) fn take(&self, node: usize) -> i64 {
        if self.heads.get_acquire(node) == NIL {
            return NIL;
        }
        self.heads.swap(node, NIL)
    }

    /// Iterates the list starting at `head`.
    pub(crate) fn iter_from(&self, head: i64) -> QueueIter<'_> {
        QueueIter {
            arena: &self.arena,
            next: head,
        }
    }

    /// Returns `true` if no message has been pushed since the last `clear`.
    pub(crate) fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Returns `true` if any vertex has a non-empty queue.
    pub(crate) fn has_pending(&self) -> bool {
        !self.is_empty()
            && (0..self.heads.size())
                .into_par_iter()
                .with_min_len(PARALLEL_MIN_LEN)
                .any(|node| self.heads.get(node) != NIL)
    }

    /// Empties every queue and recycles the arena.
    pub(crate) fn clear(&self) {
        if !self.is_empty() {
            self.heads.fill(NIL);
            self.arena.clear();
        }
    }

    /// Moves every still-linked message of `self` into `target`.
    pub(crate) fn drain_into(&self, target: &MessageQueues) {
        if self.is_empty() {
            return;
        }
        (0..self.heads.size())
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|node| {
                for value in self.iter_from(self.take(node)) {
                    target.push(node, value);
                }
            });
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        HugeAtomicLongArray::memory_estimation(self.heads.size()) + self.arena.allocated_bytes()
    }

    pub(crate) fn memory_estimation(node_count: usize) -> usize {
        HugeAtomicLongArray::memory_estimation(node_count)
            + MAX_DIRECTORIES * core::mem::size_of::<AtomicPtr<AtomicPtr<MessageCell>>>()
    }
}

/// Iterator over the payloads of one message list.
pub(crate) struct QueueIter<'a> {
    arena: &'a MessageArena,
    next: i64,
}

impl QueueIter<'_> {
    pub(crate) fn is_empty(&self) -> bool {
        self.next == NIL
    }
}

impl Iterator for QueueIter<'_> {
    type Item = f64;

    #[inline]
    fn next(&mut self) -> Option<f64> {
        if self.next == NIL {
            return None;
        }
        let cell = self.arena.cell(self.next as usize);
        self.next = cell.next.load(Ordering::Relaxed) as i64;
        Some(f64::from_bits(cell.value.load(Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_peek_take() {
        let queues = MessageQueues::new(4);
        assert!(queues.is_empty());
        queues.push(1, 1.0);
        queues.push(1, 2.0);
        queues.push(3, 3.0);

        let mut seen: Vec<f64> = queues.iter_from(queues.peek(1)).collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, vec![1.0, 2.0]);
        // Peeking does not consume.
        assert_eq!(queues.iter_from(queues.peek(1)).count(), 2);

        let taken: Vec<f64> = queues.iter_from(queues.take(3)).collect();
        assert_eq!(taken, vec![3.0]);
        assert_eq!(queues.peek(3), NIL);
        assert!(queues.has_pending());

        queues.clear();
        assert!(queues.is_empty());
        assert!(!queues.has_pending());
        assert!(queues.iter_from(queues.peek(1)).is_empty());
    }

    #[test]
    fn concurrent_pushes_to_one_target_are_all_kept() {
        let queues = MessageQueues::new(2);
        std::thread::scope(|s| {
            for t in 0..4 {
                let queues = &queues;
                s.spawn(move || {
                    for i in 0..10_000 {
                        queues.push(0, f64::from(t * 10_000 + i));
                    }
                });
            }
        });
        let mut all: Vec<f64> = queues.iter_from(queues.peek(0)).collect();
        assert_eq!(all.len(), 40_000);
        all.sort_by(f64::total_cmp);
        all.dedup();
        assert_eq!(all.len(), 40_000);
    }

    #[test]
    fn pushes_span_arena_pages() {
        let sends: u32 = (1 << DEFAULT_PAGE_SHIFT) + 10;
        let queues = MessageQueues::new(1);
        for i in 0..sends {
            queues.push(0, f64::from(i));
        }
        assert_eq!(queues.iter_from(queues.peek(0)).count(), sends as usize);
    }

    #[test]
    fn pushes_span_directories() {
        // Four cells per page: the first directory holds 16384 cells.
        let queues = MessageQueues::with_page_shift(3, 2);
        let first_directory = DIRECTORY_SIZE << 2;
        let sends = 2 * first_directory + 7;
        for i in 0..sends {
            queues.push(i % 3, f64::from(u32::try_from(i).unwrap()));
        }
        let received: usize = (0..3).map(|node| queues.iter_from(queues.peek(node)).count()).sum();
        assert_eq!(received, sends);
        let mut seen: Vec<f64> = queues.iter_from(queues.peek(1)).collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen.first(), Some(&1.0));
        assert_eq!(seen.last(), Some(&f64::from(u32::try_from(sends - 2).unwrap())));

        queues.clear();
        assert!(queues.is_empty());
        queues.push(2, 9.0);
        assert_eq!(queues.iter_from(queues.peek(2)).collect::<Vec<_>>(), vec![9.0]);
        assert!(queues.allocated_bytes() > first_directory * core::mem::size_of::<MessageCell>());
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn exceeding_arena_capacity_panics() {
        let arena = MessageArena::new(0);
        let _ = arena.cell(arena.capacity());
    }

    #[test]
    fn drain_moves_pending_lists() {
        let from = MessageQueues::new(3);
        let to = MessageQueues::new(3);
        from.push(2, 5.0);
        from.push(0, 6.0);
        from.drain_into(&to);
        from.clear();
        assert_eq!(to.iter_from(to.peek(2)).collect::<Vec<_>>(), vec![5.0]);
        assert_eq!(to.iter_from(to.peek(0)).collect::<Vec<_>>(), vec![6.0]);
        assert!(!from.has_pending());
    }

    #[test]
    fn parallel_scans_cover_every_head() {
        let node_count = PARALLEL_MIN_LEN * 6 + 5;
        let from = MessageQueues::new(node_count);
        let to = MessageQueues::new(node_count);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        pool.install(|| {
            from.push(node_count - 1, 1.0);
            assert!(from.has_pending());
            for node in (0..node_count).step_by(3) {
                from.push(node, 2.0);
            }
            from.drain_into(&to);
            assert!(!from.has_pending());
            assert_eq!(to.iter_from(to.peek(node_count - 1)).count(), 1);
            let drained: usize = (0..node_count).map(|node| to.iter_from(to.peek(node)).count()).sum();
            assert_eq!(drained, node_count.div_ceil(3) + 1);
            to.clear();
            assert!(!to.has_pending());
        });
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_range_target_panics() {
        MessageQueues::new(2).push(2, 0.0);
    }
}
