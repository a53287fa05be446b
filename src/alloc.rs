//! Allocation-related traits
//!
//! The heap never allocates from the arena it manages: all of its own
//! bookkeeping lives in boundary tags, and this crate does not use the `alloc`
//! crate to get them. Instead, it asks an [`Allocator`] for one tag at a time.
//!
//! With the `std` feature, [`StdAllocator`] hands out tags from the global
//! allocator. With the `nightly` feature, any type that implements
//! [`core::alloc::Allocator`] can be used directly. Alternatively, you can
//! implement the [`Allocator`] trait yourself, e.g. on top of a fixed pool.

use core::ptr::NonNull;

use crate::Bt;

/// A generic allocator for boundary tags
///
/// # Implementing
/// In order to implement this trait, you must implement both
/// [`allocate`](Allocator::allocate) and [`deallocate`](Allocator::deallocate).
/// The value returned by these two functions is unspecified, as long as it is a
/// valid allocation of memory that satisfies the size and alignment of a
/// boundary tag. The tag itself may be initialized to any value, and it will be
/// immediately overwritten before use.
///
/// A heap needs one tag per extent: one per live allocation, plus one per
/// free extent. Splitting a free extent is the only operation that asks for a
/// new tag while the heap is running; freeing and compacting only give tags
/// back.
///
/// If an allocator cannot satisfy an allocation, it should return `None`. This
/// will be propagated to the caller via
/// [`Error::AllocatorError`](crate::error::Error::AllocatorError), and the heap
/// is left as it was before the call.
///
/// # Safety
/// For more advanced safety concerns, this trait follows the same rules as
/// [`core::alloc::Allocator`].
pub unsafe trait Allocator {
    /// Allocate a single boundary tag.
    fn allocate(&self) -> Option<NonNull<Bt>>;
    /// Free an allocated boundary tag.
    ///
    /// # Safety
    /// Follows the safety contract of [`core::alloc::Allocator::deallocate`].
    unsafe fn deallocate(&self, ptr: NonNull<Bt>);
}
#[cfg(feature = "nightly")]
unsafe impl<T: core::alloc::Allocator> Allocator for T {
    fn allocate(&self) -> Option<NonNull<Bt>> {
        let layout = core::alloc::Layout::new::<Bt>();
        let ptr = <Self as core::alloc::Allocator>::allocate(self, layout);
        ptr.map(|ptr| ptr.cast()).ok()
    }
    unsafe fn deallocate(&self, ptr: NonNull<Bt>) {
        let layout = core::alloc::Layout::new::<Bt>();
        unsafe { <Self as core::alloc::Allocator>::deallocate(self, ptr.cast(), layout) }
    }
}

#[cfg(any(test, feature = "std"))]
#[derive(Default, Clone, Copy, Debug)]
/// Takes boundary tags from the global allocator.
pub struct StdAllocator;
#[cfg(any(test, feature = "std"))]
unsafe impl Allocator for StdAllocator {
    fn allocate(&self) -> Option<NonNull<Bt>> {
        let layout = std::alloc::Layout::new::<Bt>();
        NonNull::new(unsafe { std::alloc::alloc(layout) }.cast())
    }
    unsafe fn deallocate(&self, ptr: NonNull<Bt>) {
        let layout = std::alloc::Layout::new::<Bt>();
        unsafe { std::alloc::dealloc(ptr.as_ptr().cast(), layout) }
    }
}
