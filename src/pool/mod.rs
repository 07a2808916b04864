//! Region pool - chained bump blocks, large-object side list, teardown callbacks
//!
//! Design: three allocation paths behind one handle:
//! 1. Small objects (<= `max`) bump-allocate from a chain of equal-sized blocks
//! 2. Large objects go to the system allocator and are tracked for free/reset
//! 3. Cleanup records defer caller teardown logic until destroy
//!
//! The handle's own state lives at the front of the first block, so a pool
//! costs exactly one system allocation until it outgrows that block.

mod align;
mod block;
mod chain;
mod cleanup;
mod large;


pub use align::POOL_ALIGNMENT;
pub use block::{BlockInfo, MIN_POOL_SIZE};
pub use cleanup::{Cleanup, CleanupHandler};

use crate::config::{PoolConfig, PAGE_SIZE};
use crate::error::{PoolError, Result};
use crate::logging::{
    log_block_grow, log_cleanup_run, log_cleanups_discarded, log_current_advance, log_destroy,
    log_large_alloc, log_large_free, log_pool_create, log_pool_undersized, log_reset,
};
use align::is_aligned;
use block::{BlockHeader, PoolHead, BLOCK_HEADER_SIZE, HEAD_SIZE};
use chain::Chain;
use core::ffi::c_void;
use core::marker::PhantomData;
use core::mem::{self, align_of, size_of};
use core::ptr::{self, NonNull};
use large::LargeRecord;

/// Handle to a region pool
///
/// Dropping the handle destroys the pool: cleanup handlers run, large
/// allocations are freed, then every block is returned to the system.
/// The handle is neither `Send` nor `Sync`; use one pool per thread.
pub struct Pool {
    head: NonNull<PoolHead>,
    _marker: PhantomData<PoolHead>,
}

/// Pool occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub blocks: usize,
    pub block_size: usize,
    pub max: usize,
    /// Bytes handed out (including alignment padding) across all blocks
    pub small_used: usize,
    pub large_live: usize,
    pub large_bytes: usize,
    pub large_tombstones: usize,
    pub cleanups: usize,
}

impl Pool {
    /// Create a pool whose blocks are `size` bytes, with default tuning
    pub fn create(size: usize) -> Result<Self> {
        Self::with_config(&PoolConfig::new(size))
    }

    pub fn with_config(config: &PoolConfig) -> Result<Self> {
        let size = if config.size < MIN_POOL_SIZE {
            log_pool_undersized(config.size, MIN_POOL_SIZE);
            MIN_POOL_SIZE
        } else {
            config.size
        };
        let page_size = if config.page_size == 0 { PAGE_SIZE } else { config.page_size };

        let layout = std::alloc::Layout::from_size_align(size, POOL_ALIGNMENT)
            .map_err(|_| PoolError::alloc(size))?;
        let base = block::alloc_block(layout).ok_or_else(|| PoolError::alloc(size))?;
        let head = base.cast::<PoolHead>();
        let max = (size - HEAD_SIZE).min(page_size);

        // SAFETY: base is a fresh, suitably aligned allocation of at least HEAD_SIZE bytes
        unsafe {
            let start = base.as_ptr();
            head.as_ptr().write(PoolHead {
                block: BlockHeader {
                    last: start.add(HEAD_SIZE),
                    end: start.add(size),
                    next: None,
                    failed: 0,
                },
                max,
                current: head.cast(),
                large: None,
                cleanup: None,
                layout,
                failed_threshold: config.failed_threshold,
                large_scan_limit: config.large_scan_limit,
            });
        }

        log_pool_create(size, max, base.as_ptr());
        Ok(Self { head, _marker: PhantomData })
    }

    /// Largest request served from the block chain
    #[inline]
    pub fn max(&self) -> usize {
        // SAFETY: head stays valid for the handle's lifetime
        unsafe { (*self.head.as_ptr()).max }
    }

    /// Size of every block in the chain
    #[inline]
    pub fn block_size(&self) -> usize {
        unsafe { (*self.head.as_ptr()).layout.size() }
    }

    /// Allocate `size` bytes aligned to [`POOL_ALIGNMENT`]
    #[inline]
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        let ptr = if size <= self.max() {
            self.alloc_small(size, true)?
        } else {
            self.alloc_large(size)?
        };
        debug_assert!(is_aligned(ptr.as_ptr() as usize, POOL_ALIGNMENT));
        Ok(ptr)
    }

    /// Allocate `size` bytes without rounding the cursor (strings, byte buffers)
    #[inline]
    pub fn alloc_unaligned(&mut self, size: usize) -> Result<NonNull<u8>> {
        if size <= self.max() {
            self.alloc_small(size, false)
        } else {
            self.alloc_large(size)
        }
    }

    pub fn alloc_zeroed(&mut self, size: usize) -> Result<NonNull<u8>> {
        let ptr = self.alloc(size)?;
        // SAFETY: ptr is valid for `size` bytes
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Move `value` into the pool. Its destructor never runs.
    pub fn alloc_value<T>(&mut self, value: T) -> Result<NonNull<T>> {
        check_align::<T>()?;
        let ptr = self.alloc(size_of::<T>())?.cast::<T>();
        // SAFETY: fresh allocation, sized and aligned for T
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Copy `bytes` into the pool through the unaligned path
    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> Result<NonNull<[u8]>> {
        let ptr = self.alloc_unaligned(bytes.len())?;
        // SAFETY: ptr is valid for bytes.len() bytes and cannot overlap `bytes`
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        Ok(NonNull::slice_from_raw_parts(ptr, bytes.len()))
    }

    pub fn alloc_str(&mut self, s: &str) -> Result<NonNull<str>> {
        let bytes = self.alloc_bytes(s.as_bytes())?;
        // SAFETY: the bytes were copied from a valid str
        Ok(unsafe { NonNull::new_unchecked(bytes.as_ptr() as *mut str) })
    }

    /// Bump-allocate from the chain, starting at `current`
    fn alloc_small(&mut self, size: usize, aligned: bool) -> Result<NonNull<u8>> {
        // SAFETY: every block reachable from current is owned by this pool
        let blocks = unsafe { Chain::new(Some((*self.head.as_ptr()).current)) };
        for mut block in blocks {
            if let Some(ptr) = unsafe { block.as_mut() }.try_bump(size, aligned) {
                return Ok(ptr);
            }
        }

        self.grow_block(size)
    }

    /// Append a block sized like the first one and claim `size` bytes from it.
    /// Blocks walked from `current` to the tail count a miss each; one whose
    /// earlier misses exceed the threshold is skipped by later scans.
    fn grow_block(&mut self, size: usize) -> Result<NonNull<u8>> {
        let head = self.head.as_ptr();
        let layout = unsafe { (*head).layout };

        let base = block::alloc_block(layout).ok_or_else(|| PoolError::alloc(layout.size()))?;
        let offset = block::secondary_data_offset(base.as_ptr() as usize);
        if offset + size > layout.size() {
            // SAFETY: base came from alloc_block with this layout
            unsafe { block::free_block(base.cast(), layout) };
            return Err(PoolError::alloc(size));
        }

        let fresh = base.cast::<BlockHeader>();
        // SAFETY: offset + size fits in the new block
        let claimed = unsafe {
            let start = base.as_ptr();
            let data = start.add(offset);
            fresh.as_ptr().write(BlockHeader {
                last: data.add(size),
                end: start.add(layout.size()),
                next: None,
                failed: 0,
            });
            NonNull::new_unchecked(data)
        };

        unsafe {
            let threshold = (*head).failed_threshold;
            let mut block = (*head).current;
            loop {
                let header = &mut *block.as_ptr();
                let missed = header.failed;
                header.failed = header_failed(missed);
                let next = header.next;
                if next.is_none() {
                    header.next = Some(fresh);
                }

                if missed > threshold {
                    (*head).current = next.unwrap_or(fresh);
                    log_current_advance(header_failed(missed), block.as_ptr().cast());
                }

                match next {
                    Some(successor) => block = successor,
                    None => break,
                }
            }
        }

        log_block_grow(layout.size(), base.as_ptr());
        Ok(claimed)
    }

    /// Serve `size` bytes from the system allocator and track them
    fn alloc_large(&mut self, size: usize) -> Result<NonNull<u8>> {
        let (ptr, layout) = large::alloc_large(size).ok_or_else(|| PoolError::alloc(size))?;
        let head = self.head.as_ptr();

        // SAFETY: the record list is owned by this pool
        unsafe {
            if let Some(mut slot) = large::find_tombstone((*head).large, (*head).large_scan_limit) {
                slot.as_mut().fill(ptr, layout);
                log_large_alloc(size, ptr.as_ptr(), true);
                return Ok(ptr);
            }
        }

        let record = match self.alloc_small(size_of::<LargeRecord>(), true) {
            Ok(record) => record.cast::<LargeRecord>(),
            Err(err) => {
                // SAFETY: ptr was just allocated with layout and is untracked
                unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
                return Err(err);
            }
        };

        unsafe {
            record.as_ptr().write(LargeRecord {
                alloc: Some(ptr),
                layout,
                next: (*head).large,
            });
            (*head).large = Some(record);
        }

        log_large_alloc(size, ptr.as_ptr(), false);
        Ok(ptr)
    }

    /// Free one large allocation ahead of reset/destroy.
    ///
    /// Small-object memory is never freed individually; passing such a
    /// pointer, or one already freed, yields [`PoolError::NotFound`].
    pub fn free_large(&mut self, ptr: NonNull<u8>) -> Result<()> {
        // SAFETY: the record list is owned by this pool
        unsafe {
            match large::find_live((*self.head.as_ptr()).large, ptr) {
                Some(mut record) => {
                    let size = record.as_mut().release();
                    log_large_free(size, ptr.as_ptr());
                    Ok(())
                }
                None => Err(PoolError::NotFound { addr: ptr.as_ptr() as usize }),
            }
        }
    }

    /// Register a teardown callback, optionally with a `size`-byte context
    /// buffer carved from the pool. With `size == 0` the context is null.
    ///
    /// The handler starts unset; records without a handler are skipped.
    pub fn add_cleanup(&mut self, size: usize) -> Result<&mut Cleanup> {
        let record = self.alloc_small(size_of::<Cleanup>(), true)?.cast::<Cleanup>();
        let data = if size > 0 {
            self.alloc(size)?.as_ptr().cast::<c_void>()
        } else {
            ptr::null_mut()
        };

        // SAFETY: record is a fresh allocation sized and aligned for Cleanup
        unsafe {
            let head = self.head.as_ptr();
            record.as_ptr().write(Cleanup::new(data, (*head).cleanup));
            (*head).cleanup = Some(record);
            Ok(&mut *record.as_ptr())
        }
    }

    /// Run `f` when the pool is destroyed. The closure is stored in a
    /// cleanup context buffer; a reset drops it without running it.
    pub fn on_destroy<F: FnOnce() + 'static>(&mut self, f: F) -> Result<()> {
        check_align::<F>()?;
        let cleanup = self.add_cleanup(size_of::<F>())?;
        let data = if size_of::<F>() == 0 {
            NonNull::<F>::dangling().as_ptr()
        } else {
            cleanup.data().cast::<F>()
        };

        // SAFETY: data is sized and aligned for F; run_closure::<F> reads it back exactly once
        unsafe {
            data.write(f);
            cleanup.set_data(data.cast());
            cleanup.set_handler(cleanup::run_closure::<F>);
            cleanup.set_dispose(cleanup::drop_closure::<F>);
        }
        Ok(())
    }

    /// Free all large allocations and rewind every block; blocks are kept.
    ///
    /// Cleanup records live in block memory, so they are discarded without
    /// running. Closures from [`on_destroy`](Self::on_destroy) are dropped;
    /// release anything raw records guard before calling this.
    pub fn reset(&mut self) {
        let head = self.head.as_ptr();

        // SAFETY: all lists and blocks are owned by this pool
        unsafe {
            // Closure contexts may sit in large allocations; drop them first
            let discarded = cleanup::count((*head).cleanup);
            if discarded > 0 {
                let dropped = cleanup::dispose_all((*head).cleanup);
                log_cleanups_discarded(discarded, dropped);
            }
            (*head).cleanup = None;

            let large_freed = large::release_all((*head).large);
            (*head).large = None;

            let first = self.head.cast::<BlockHeader>();
            let mut blocks = 0;
            for block in Chain::new(Some(first)) {
                let header_size = if block == first { HEAD_SIZE } else { BLOCK_HEADER_SIZE };
                BlockHeader::rewind(block, header_size);
                blocks += 1;
            }
            (*head).current = first;

            log_reset(blocks, large_freed);
        }
    }

    /// Tear the pool down. Equivalent to dropping the handle.
    pub fn destroy(self) {
        drop(self);
    }

    /// Snapshot of every block in chain order
    pub fn blocks(&self) -> Vec<BlockInfo> {
        let first = self.head.cast::<BlockHeader>();
        // SAFETY: blocks are owned by this pool
        unsafe {
            Chain::new(Some(first))
                .map(|block| {
                    let header_size = if block == first { HEAD_SIZE } else { BLOCK_HEADER_SIZE };
                    BlockInfo::read(block, header_size)
                })
                .collect()
        }
    }

    /// Chain index of the block where small-object scans start
    pub fn current_block(&self) -> usize {
        let first = self.head.cast::<BlockHeader>();
        unsafe {
            let current = (*self.head.as_ptr()).current;
            Chain::new(Some(first))
                .position(|block| block == current)
                .unwrap_or(0)
        }
    }

    /// Whether `ptr` was drawn from one of the pool's blocks
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.blocks().iter().any(|block| block.contains(addr))
    }

    pub fn stats(&self) -> PoolStats {
        let blocks = self.blocks();
        let head = self.head.as_ptr();
        // SAFETY: lists are owned by this pool
        let ((large_live, large_bytes, large_tombstones), cleanups) =
            unsafe { (large::census((*head).large), cleanup::count((*head).cleanup)) };

        PoolStats {
            blocks: blocks.len(),
            block_size: self.block_size(),
            max: self.max(),
            small_used: blocks.iter().map(BlockInfo::used).sum(),
            large_live,
            large_bytes,
            large_tombstones,
            cleanups,
        }
    }

    /// Give up ownership, returning the address of the pool head
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.head.as_ptr().cast::<c_void>();
        mem::forget(self);
        raw
    }

    /// Re-adopt a handle produced by [`into_raw`](Self::into_raw)
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` and must not be adopted twice.
    pub unsafe fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw.cast::<PoolHead>()).map(|head| Self { head, _marker: PhantomData })
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let head = self.head.as_ptr();

        // SAFETY: the pool exclusively owns every list and block; head is
        // read for the last time before the first block is freed
        unsafe {
            let (ran, skipped) = cleanup::run_all((*head).cleanup);
            log_cleanup_run(ran, skipped);

            let large_freed = large::release_all((*head).large);

            let layout = (*head).layout;
            let mut blocks = 0;
            for block in Chain::new(Some(self.head.cast::<BlockHeader>())) {
                block::free_block(block, layout);
                blocks += 1;
            }

            log_destroy(blocks, large_freed);
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("head", &self.head)
            .field("stats", &self.stats())
            .finish()
    }
}

#[inline]
fn header_failed(missed: u32) -> u32 {
    missed.saturating_add(1)
}

fn check_align<T>() -> Result<()> {
    let align = align_of::<T>();
    if align > POOL_ALIGNMENT {
        return Err(PoolError::UnsupportedAlignment { align, max: POOL_ALIGNMENT });
    }
    Ok(())
}
