//! Block layout - the two header shapes of the chain
//!
//! Every block starts with a [`BlockHeader`]. The first block instead
//! starts with a [`PoolHead`], whose first field is that same header, so
//! the chain can be walked through one view. Secondary blocks are sized
//! like the first and simply leave the head-only bytes unused.

use super::align::{align_up, padding_for, POOL_ALIGNMENT};
use super::chain::Link;
use super::cleanup::Cleanup;
use super::large::LargeRecord;
use core::mem::size_of;
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, Layout};

/// Per-block bump state
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Bump cursor; never moves backwards except on reset
    pub(crate) last: *mut u8,
    pub(crate) end: *mut u8,
    pub(crate) next: Option<NonNull<BlockHeader>>,
    /// Consecutive growth events this block could not serve
    pub(crate) failed: u32,
}

impl BlockHeader {
    /// Bump `size` bytes, rounding the cursor to [`POOL_ALIGNMENT`] first
    /// when `aligned`. Returns None if the block cannot fit the request.
    #[inline(always)]
    pub(crate) fn try_bump(&mut self, size: usize, aligned: bool) -> Option<NonNull<u8>> {
        let last = self.last as usize;
        let remaining = (self.end as usize).saturating_sub(last);
        let pad = if aligned { padding_for(last, POOL_ALIGNMENT) } else { 0 };

        if pad > remaining || remaining - pad < size {
            return None;
        }

        // SAFETY: pad + size <= end - last, so both stay inside the block
        unsafe {
            let candidate = self.last.add(pad);
            self.last = candidate.add(size);
            NonNull::new(candidate)
        }
    }

    /// Rewind the cursor to `header_size` bytes past the block start
    ///
    /// # Safety
    ///
    /// `block` must point at the start of a live block at least
    /// `header_size` bytes long.
    #[inline]
    pub(crate) unsafe fn rewind(block: NonNull<BlockHeader>, header_size: usize) {
        let start = block.as_ptr().cast::<u8>();
        let header = &mut *block.as_ptr();
        header.last = start.add(header_size);
        header.failed = 0;
    }
}

impl Link for BlockHeader {
    #[inline]
    fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }
}

/// Pool-wide fields, hosted at the front of the first block
#[repr(C)]
pub(crate) struct PoolHead {
    pub(crate) block: BlockHeader,
    /// Largest request served by the block chain
    pub(crate) max: usize,
    /// Block where small-object scans start
    pub(crate) current: NonNull<BlockHeader>,
    pub(crate) large: Option<NonNull<LargeRecord>>,
    pub(crate) cleanup: Option<NonNull<Cleanup>>,
    /// Layout shared by every block of the chain
    pub(crate) layout: Layout,
    pub(crate) failed_threshold: u32,
    pub(crate) large_scan_limit: usize,
}

pub(crate) const HEAD_SIZE: usize = size_of::<PoolHead>();
pub(crate) const BLOCK_HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Smallest pool that can host its handle plus two large records
pub const MIN_POOL_SIZE: usize =
    align_up(HEAD_SIZE + 2 * size_of::<LargeRecord>(), POOL_ALIGNMENT);

/// Snapshot of one block, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the block start
    pub start: usize,
    /// First address past the block's header
    pub data_start: usize,
    /// Bump cursor
    pub last: usize,
    pub end: usize,
    pub failed: u32,
}

impl BlockInfo {
    /// # Safety
    ///
    /// `block` must point to a live block header of `header_size` bytes.
    pub(crate) unsafe fn read(block: NonNull<BlockHeader>, header_size: usize) -> Self {
        let header = block.as_ref();
        let start = block.as_ptr() as usize;
        Self {
            start,
            data_start: start + header_size,
            last: header.last as usize,
            end: header.end as usize,
            failed: header.failed,
        }
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.last.saturating_sub(self.data_start)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.end - self.last
    }

    /// Whether `addr` lies in the block's allocatable region
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.data_start && addr < self.end
    }
}

/// Request one raw block from the system allocator
#[inline]
pub(crate) fn alloc_block(layout: Layout) -> Option<NonNull<u8>> {
    debug_assert!(layout.size() > 0);
    // SAFETY: layout has non-zero size
    NonNull::new(unsafe { alloc(layout) })
}

/// # Safety
///
/// `block` must have been returned by [`alloc_block`] with `layout`.
#[inline]
pub(crate) unsafe fn free_block(block: NonNull<BlockHeader>, layout: Layout) {
    dealloc(block.as_ptr().cast::<u8>(), layout);
}

/// Aligned offset of the first byte a secondary block hands out
#[inline]
pub(crate) fn secondary_data_offset(start: usize) -> usize {
    BLOCK_HEADER_SIZE + padding_for(start + BLOCK_HEADER_SIZE, POOL_ALIGNMENT)
}
