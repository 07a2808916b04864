//! C FFI - Public C API for the pool
//!
//! Design: Stable C API for embedding in non-Rust programs. A pool is
//! passed around as an opaque pointer produced by [`regionpool_create`];
//! every failure surfaces as a null pointer or a non-zero status.

use crate::logging::{trace, warn};
use crate::pool::{Cleanup, CleanupHandler, Pool};
use core::ffi::{c_int, c_void};
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};

/// Status returned by [`regionpool_pfree`] on success
pub const REGIONPOOL_OK: c_int = 0;
/// Status returned when the pointer is not a live large allocation
pub const REGIONPOOL_DECLINED: c_int = 1;

/// Borrow the pool behind `raw` without taking ownership
///
/// # Safety
/// - raw must be null or come from `regionpool_create` and not be destroyed
unsafe fn with_pool<R>(raw: *mut c_void, f: impl FnOnce(&mut Pool) -> R) -> Option<R> {
    match Pool::from_raw(raw) {
        Some(pool) => {
            let mut pool = ManuallyDrop::new(pool);
            Some(f(&mut pool))
        }
        None => {
            warn!(target: "regionpool::ffi", "null pool handle");
            None
        }
    }
}

fn into_c(result: crate::Result<NonNull<u8>>) -> *mut c_void {
    result
        .map(|ptr| ptr.as_ptr().cast::<c_void>())
        .unwrap_or(ptr::null_mut())
}

/// Create a pool whose blocks are `size` bytes
///
/// Returns null on allocation failure.
#[no_mangle]
pub extern "C" fn regionpool_create(size: usize) -> *mut c_void {
    trace!(target: "regionpool::ffi", size, "create");
    Pool::create(size)
        .map(Pool::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Allocate `size` aligned bytes
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_palloc(pool: *mut c_void, size: usize) -> *mut c_void {
    with_pool(pool, |pool| into_c(pool.alloc(size))).unwrap_or(ptr::null_mut())
}

/// Allocate `size` bytes without alignment
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_pnalloc(pool: *mut c_void, size: usize) -> *mut c_void {
    with_pool(pool, |pool| into_c(pool.alloc_unaligned(size))).unwrap_or(ptr::null_mut())
}

/// Allocate `size` aligned, zero-filled bytes
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_pcalloc(pool: *mut c_void, size: usize) -> *mut c_void {
    with_pool(pool, |pool| into_c(pool.alloc_zeroed(size))).unwrap_or(ptr::null_mut())
}

/// Free one large allocation early
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_pfree(pool: *mut c_void, p: *mut c_void) -> c_int {
    let Some(p) = NonNull::new(p.cast::<u8>()) else {
        return REGIONPOOL_DECLINED;
    };
    match with_pool(pool, |pool| pool.free_large(p)) {
        Some(Ok(())) => REGIONPOOL_OK,
        _ => REGIONPOOL_DECLINED,
    }
}

/// Free large allocations and rewind every block
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_reset(pool: *mut c_void) {
    with_pool(pool, Pool::reset);
}

/// Run cleanups and release all pool memory, including the handle
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
/// - pool must not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn regionpool_destroy(pool: *mut c_void) {
    if let Some(pool) = Pool::from_raw(pool) {
        pool.destroy();
    }
}

/// Register a cleanup record with an optional `size`-byte context buffer
///
/// The handler starts unset; assign it with [`regionpool_cleanup_set`].
///
/// # Safety
/// - pool must be a live handle from `regionpool_create`
#[no_mangle]
pub unsafe extern "C" fn regionpool_cleanup_add(pool: *mut c_void, size: usize) -> *mut Cleanup {
    with_pool(pool, |pool| {
        pool.add_cleanup(size)
            .map(|cleanup| cleanup as *mut Cleanup)
            .unwrap_or(ptr::null_mut())
    })
    .unwrap_or(ptr::null_mut())
}

/// Context pointer of a cleanup record
///
/// # Safety
/// - cleanup must come from `regionpool_cleanup_add` on a live pool
#[no_mangle]
pub unsafe extern "C" fn regionpool_cleanup_data(cleanup: *mut Cleanup) -> *mut c_void {
    cleanup.as_ref().map_or(ptr::null_mut(), Cleanup::data)
}

/// Set the handler and context of a cleanup record
///
/// A null `data` keeps the context buffer allocated by `regionpool_cleanup_add`.
/// A null `handler` leaves the record untouched.
///
/// # Safety
/// - cleanup must come from `regionpool_cleanup_add` on a live pool
/// - handler must be sound to call once with the record's context
#[no_mangle]
pub unsafe extern "C" fn regionpool_cleanup_set(
    cleanup: *mut Cleanup,
    handler: Option<CleanupHandler>,
    data: *mut c_void,
) {
    let (Some(cleanup), Some(handler)) = (cleanup.as_mut(), handler) else {
        warn!(target: "regionpool::ffi", "null cleanup record or handler");
        return;
    };
    if !data.is_null() {
        cleanup.set_data(data);
    }
    cleanup.set_handler(handler);
}
