//! Forward walk over the pool's intrusive singly-linked lists
//!
//! Blocks, large-allocation records and cleanup records all live in raw
//! memory and link to each other through `Option<NonNull<_>>`. `Chain`
//! reads a node's successor before yielding it, so callers may free the
//! yielded node without breaking the walk.

use core::marker::PhantomData;
use core::ptr::NonNull;

/// A node that links to the next node of the same list
pub(crate) trait Link {
    fn next(&self) -> Option<NonNull<Self>>;
}

pub(crate) struct Chain<'a, T: Link> {
    next: Option<NonNull<T>>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: Link> Chain<'a, T> {
    /// # Safety
    ///
    /// Every node reachable from `first` must be valid for reads until the
    /// walk has moved past it.
    #[inline]
    pub(crate) unsafe fn new(first: Option<NonNull<T>>) -> Self {
        Self { next: first, _marker: PhantomData }
    }
}

impl<'a, T: Link> Iterator for Chain<'a, T> {
    type Item = NonNull<T>;

    #[inline]
    fn next(&mut self) -> Option<NonNull<T>> {
        let node = self.next?;
        // SAFETY: guaranteed by the contract of `Chain::new`
        self.next = unsafe { node.as_ref().next() };
        Some(node)
    }
}
