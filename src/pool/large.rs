//! Large-allocation registry
//!
//! Requests above the pool's `max` go straight to the system allocator.
//! Each one is tracked by a record carved from the block chain; freeing
//! a large allocation leaves its record as a tombstone for later reuse.

use super::align::POOL_ALIGNMENT;
use super::chain::{Chain, Link};
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, Layout};

#[repr(C)]
pub(crate) struct LargeRecord {
    /// None marks a tombstone
    pub(crate) alloc: Option<NonNull<u8>>,
    pub(crate) layout: Layout,
    pub(crate) next: Option<NonNull<LargeRecord>>,
}

impl LargeRecord {
    #[inline]
    pub(crate) fn is_tombstone(&self) -> bool {
        self.alloc.is_none()
    }

    #[inline]
    pub(crate) fn fill(&mut self, ptr: NonNull<u8>, layout: Layout) {
        debug_assert!(self.is_tombstone());
        self.alloc = Some(ptr);
        self.layout = layout;
    }

    /// Free the tracked allocation and tombstone the record.
    /// Returns the number of bytes released.
    ///
    /// # Safety
    ///
    /// A live `alloc` must still be owned by this record.
    pub(crate) unsafe fn release(&mut self) -> usize {
        match self.alloc.take() {
            Some(ptr) => {
                dealloc(ptr.as_ptr(), self.layout);
                self.layout.size()
            }
            None => 0,
        }
    }
}

impl Link for LargeRecord {
    #[inline]
    fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }
}

/// Allocate `size` bytes from the system allocator
pub(crate) fn alloc_large(size: usize) -> Option<(NonNull<u8>, Layout)> {
    let layout = Layout::from_size_align(size, POOL_ALIGNMENT).ok()?;
    if layout.size() == 0 {
        return None;
    }
    // SAFETY: layout has non-zero size
    let ptr = NonNull::new(unsafe { alloc(layout) })?;
    Some((ptr, layout))
}

/// Find a tombstone among the first `limit` records
///
/// # Safety
///
/// `first` must head a valid record list.
pub(crate) unsafe fn find_tombstone(
    first: Option<NonNull<LargeRecord>>,
    limit: usize,
) -> Option<NonNull<LargeRecord>> {
    Chain::new(first)
        .take(limit)
        .find(|record| record.as_ref().is_tombstone())
}

/// Find the record tracking `ptr`
///
/// # Safety
///
/// `first` must head a valid record list.
pub(crate) unsafe fn find_live(
    first: Option<NonNull<LargeRecord>>,
    ptr: NonNull<u8>,
) -> Option<NonNull<LargeRecord>> {
    Chain::new(first).find(|record| record.as_ref().alloc == Some(ptr))
}

/// Release every live allocation in the list, returning how many were freed
///
/// # Safety
///
/// `first` must head a valid record list that owns its allocations.
pub(crate) unsafe fn release_all(first: Option<NonNull<LargeRecord>>) -> usize {
    let mut freed = 0;
    for mut record in Chain::new(first) {
        if record.as_mut().release() > 0 {
            freed += 1;
        }
    }
    freed
}

/// Live allocation count, live bytes and tombstone count
///
/// # Safety
///
/// `first` must head a valid record list.
pub(crate) unsafe fn census(first: Option<NonNull<LargeRecord>>) -> (usize, usize, usize) {
    Chain::new(first).fold((0, 0, 0), |(live, bytes, tombstones), record| {
        let record = record.as_ref();
        if record.is_tombstone() {
            (live, bytes, tombstones + 1)
        } else {
            (live + 1, bytes + record.layout.size(), tombstones)
        }
    })
}
