//! Cleanup registry - deferred teardown callbacks
//!
//! Records are carved from the block chain and pushed at the head of the
//! list, so destroy walks them most-recently-registered first.

use super::chain::{Chain, Link};
use crate::logging::error;
use core::ffi::c_void;
use core::ptr::{self, NonNull};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Callback run at destroy with the record's context pointer
pub type CleanupHandler = unsafe extern "C" fn(*mut c_void);

/// One registered teardown callback
///
/// Returned by [`Pool::add_cleanup`](super::Pool::add_cleanup) with no
/// handler set. The context pointer is either a pool-allocated scratch
/// buffer or null, and may be replaced by the caller.
#[repr(C)]
pub struct Cleanup {
    handler: Option<CleanupHandler>,
    data: *mut c_void,
    /// Releases the context when reset discards the record unrun
    dispose: Option<CleanupHandler>,
    next: Option<NonNull<Cleanup>>,
}

impl Cleanup {
    #[inline]
    pub(crate) fn new(data: *mut c_void, next: Option<NonNull<Cleanup>>) -> Self {
        Self { handler: None, data, dispose: None, next }
    }

    #[inline]
    pub(crate) fn set_dispose(&mut self, dispose: CleanupHandler) {
        self.dispose = Some(dispose);
    }

    /// Install the callback run at destroy.
    ///
    /// # Safety
    ///
    /// `handler` must be sound to call exactly once with whatever
    /// [`data`](Self::data) holds when the pool is destroyed.
    #[inline]
    pub unsafe fn set_handler(&mut self, handler: CleanupHandler) {
        self.handler = Some(handler);
    }

    #[inline]
    pub fn handler(&self) -> Option<CleanupHandler> {
        self.handler
    }

    #[inline]
    pub fn data(&self) -> *mut c_void {
        self.data
    }

    #[inline]
    pub fn set_data(&mut self, data: *mut c_void) {
        self.data = data;
    }
}

impl Link for Cleanup {
    #[inline]
    fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }
}

/// Invoke every handler in list order. Records without a handler are
/// skipped. Returns (ran, skipped).
///
/// # Safety
///
/// `first` must head a valid record list whose handlers honour the
/// contract of [`Cleanup::set_handler`].
pub(crate) unsafe fn run_all(first: Option<NonNull<Cleanup>>) -> (usize, usize) {
    let mut ran = 0;
    let mut skipped = 0;
    for record in Chain::new(first) {
        let record = record.as_ref();
        match record.handler {
            Some(handler) => {
                handler(record.data);
                ran += 1;
            }
            None => skipped += 1,
        }
    }
    (ran, skipped)
}

/// Release the context of every record that carries a dispose hook,
/// without running its handler. Returns how many were released.
///
/// # Safety
///
/// `first` must head a valid record list whose handlers have not run.
pub(crate) unsafe fn dispose_all(first: Option<NonNull<Cleanup>>) -> usize {
    let mut disposed = 0;
    for mut record in Chain::new(first) {
        let record = record.as_mut();
        if let Some(dispose) = record.dispose.take() {
            record.handler = None;
            dispose(record.data);
            disposed += 1;
        }
    }
    disposed
}

/// # Safety
///
/// `first` must head a valid record list.
pub(crate) unsafe fn count(first: Option<NonNull<Cleanup>>) -> usize {
    Chain::new(first).count()
}

/// Handler that moves a closure out of its context buffer and calls it
///
/// A panicking closure is logged and swallowed: handlers have no
/// failure channel and must not unwind across the C ABI.
pub(crate) unsafe extern "C" fn run_closure<F: FnOnce()>(data: *mut c_void) {
    let f = ptr::read(data.cast::<F>());
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(target: "regionpool::cleanup", "cleanup closure panicked");
    }
}

/// Dispose hook that drops a closure in place without calling it
pub(crate) unsafe extern "C" fn drop_closure<F>(data: *mut c_void) {
    let data = data.cast::<F>();
    if catch_unwind(AssertUnwindSafe(|| ptr::drop_in_place(data))).is_err() {
        error!(target: "regionpool::cleanup", "dropping cleanup closure panicked");
    }
}
