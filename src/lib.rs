#![doc = include_str!("../README.md")]
#![cfg_attr(not(any(test, doc, feature = "std")), no_std)]
#![cfg_attr(feature = "nightly", feature(allocator_api))]
#![deny(missing_docs)]

use core::{
    fmt::{Debug, Display},
    ops::Range,
    ptr::NonNull,
};

use allocation_table::AllocationTable;
use freelists::Freelists;
use handle::HandleTable;
use list::{AddressList, AddressListIter};

pub use crate::bt::Bt;
use crate::bt::Type;

#[doc(inline)]
pub use alloc::*;
#[doc(inline)]
pub use error::*;
pub use extent::{Extent, ExtentKind};
pub use handle::Handle;

pub mod alloc;
pub mod error;

mod allocation_table;
mod bt;
mod extent;
mod freelists;
mod handle;
mod list;

/// Number of handle slots a [`Heap`] has unless told otherwise.
pub const DEFAULT_HANDLES: usize = 64;

/// A compacting heap over a single byte arena.
///
/// Allocations are handed out as [`Handle`]s rather than addresses. The heap
/// is free to move an allocation's bytes, and does so in
/// [`defrag`](Heap::defrag), updating the handle's slot so that the client
/// finds the data at its new location the next time it looks.
///
/// # Usage
/// A heap needs three things:
/// - **An arena**. A mutable byte slice the heap borrows for its whole
///   lifetime. The heap never grows it, shrinks it, or frees it.
/// - **An allocator**. This is the type that will be used to allocate the
///   boundary tags used for bookkeeping. It must implement the
///   [`alloc::Allocator`] trait. With the `std` feature, [`StdAllocator`] is
///   available.
/// - **A number of handle slots**. This is the const parameter `HANDLES`, and
///   caps the number of simultaneously live allocations.
///
/// ```rust
/// # #[cfg(feature = "std")] {
/// # use relocheap::{Heap, StdAllocator};
/// let mut memory = [0u8; 100];
/// let mut heap = Heap::<_>::create("doc", &mut memory, StdAllocator).unwrap();
///
/// let first = heap.alloc(30).unwrap();
/// let second = heap.alloc(20).unwrap();
/// heap.set(second, b"hello").unwrap();
/// heap.free(first).unwrap();
///
/// heap.defrag().unwrap();
/// assert_eq!(heap.get(second), Some(heap.base()));
/// assert_eq!(&heap.bytes(second).unwrap()[..5], b"hello");
/// # }
/// ```
///
/// # Placement
/// Allocation is best fit: the smallest free extent that holds the request is
/// split, and among equally small extents the one at the lowest address wins.
/// Freeing merges the released extent with the free extent directly after it,
/// but never with the one directly before it. Fragmentation that this leaves
/// behind is only removed by [`defrag`](Heap::defrag).
///
/// # Exclusion
/// Every operation that can move or release bytes takes `&mut self`, so an
/// address obtained through [`get`](Heap::get) must be treated as stale after
/// any such call. Sharing a heap between threads requires wrapping it in a
/// lock.
pub struct Heap<'label, 'mem, A: alloc::Allocator, const HANDLES: usize = DEFAULT_HANDLES> {
    label: &'label str,
    memory: &'mem mut [u8],
    inner: HeapInner<HANDLES>,
    allocator: A,
}
impl<'label, 'mem, A: alloc::Allocator, const HANDLES: usize> Heap<'label, 'mem, A, HANDLES> {
    /// Create a heap that manages all of `memory`.
    ///
    /// # Parameters
    /// - `label` - a label for the heap. This is used for debugging purposes.
    /// - `memory` - the arena. Every byte of it starts out free.
    /// - `allocator` - the allocator to use for allocating boundary tags.
    ///
    /// # Returns
    /// If the heap could not be created, one of these errors will be returned:
    /// - [`Error::AllocZeroSize`] - `memory` is empty.
    /// - [`Error::AllocatorError`] - the allocator could not allocate a
    ///   boundary tag for the initial free extent.
    pub fn create(label: &'label str, memory: &'mem mut [u8], allocator: A) -> error::Result<Self> {
        if memory.is_empty() {
            return Err(Error::AllocZeroSize);
        }

        let base = memory.as_ptr() as usize;
        let bt = allocator.allocate().ok_or(Error::AllocatorError)?;
        unsafe { bt.as_ptr().write(Bt::free(base, memory.len())) };

        let mut inner = HeapInner {
            segment_list: AddressList::EMPTY,
            freelists: Freelists::new(),
            allocation_table: AllocationTable::new(),
            handles: HandleTable::new(base),
        };
        unsafe {
            inner.segment_list.push_back(bt);
            inner.freelists.insert(bt);
        }

        log::debug!("{label}: created heap at {base:#x} (len: {:#x})", memory.len());

        Ok(Self {
            label,
            memory,
            inner,
            allocator,
        })
    }

    /// Allocate `size` bytes.
    ///
    /// # Returns
    /// A handle to the new allocation. The bytes are not cleared. If a block
    /// could not be allocated, the heap is left untouched and one of the
    /// following errors will be returned:
    /// - [`Error::AllocZeroSize`] - `size` is zero.
    /// - [`Error::OutOfMemory`] - no free extent is large enough. There may
    ///   still be enough free space in total; see [`defrag`](Heap::defrag).
    /// - [`Error::OutOfHandles`] - all `HANDLES` slots are in use.
    /// - [`Error::AllocatorError`] - the allocator could not allocate a
    ///   boundary tag for the remainder of a split extent.
    pub fn alloc(&mut self, size: usize) -> error::Result<Handle> {
        if size == 0 {
            return Err(Error::AllocZeroSize);
        }
        let (handle, base) = self.inner.alloc(size, &self.allocator)?;
        log::trace!("{}: allocated {size:#x} at {base:#x} for {handle}", self.label);
        Ok(handle)
    }

    /// Free an allocation. Every copy of `handle` stops resolving.
    ///
    /// # Returns
    /// If the block could not be freed, one of the following errors will be
    /// returned:
    /// - [`Error::NoSuchAllocation`] - the handle was already freed, or was
    ///   not issued by this heap. Nothing is changed.
    pub fn free(&mut self, handle: Handle) -> error::Result<()> {
        match self.inner.free(handle, &self.allocator) {
            Ok((base, len)) => {
                log::trace!("{}: freed {len:#x} at {base:#x} from {handle}", self.label);
                Ok(())
            }
            Err(e) => {
                log::warn!("{}: free of unknown handle {handle}", self.label);
                Err(e)
            }
        }
    }

    /// Replace an allocation with a new one of `size` bytes, and point
    /// `handle` at it.
    ///
    /// This is a [`free`](Heap::free) followed by an [`alloc`](Heap::alloc).
    /// The old extent is released before the new one is chosen, so **the old
    /// contents are not carried over**, even when the new extent happens to
    /// start at the same address.
    ///
    /// # Returns
    /// - [`Error::AllocZeroSize`] - `size` is zero. The old allocation is
    ///   kept.
    /// - [`Error::NoSuchAllocation`] - `handle` is stale. Nothing is
    ///   allocated.
    /// - Any error of [`alloc`](Heap::alloc). The old allocation is already
    ///   freed by then, and `handle` is left stale.
    pub fn realloc(&mut self, handle: &mut Handle, size: usize) -> error::Result<()> {
        if size == 0 {
            return Err(Error::AllocZeroSize);
        }
        self.free(*handle)?;
        *handle = self.alloc(size)?;
        Ok(())
    }

    /// Compact the heap.
    ///
    /// Every live allocation is moved down, in address order, so that they
    /// sit back to back from the start of the arena. Handles are updated as
    /// their bytes move. All remaining space ends up in one free extent at the
    /// end of the arena, or in none if the arena is full.
    ///
    /// # Returns
    /// - [`Error::AllocatorError`] - the allocator could not allocate a
    ///   boundary tag for the trailing free extent. This cannot happen while
    ///   the heap is consistent, since a free tag is always recycled.
    pub fn defrag(&mut self) -> error::Result<()> {
        let moved = self.inner.defrag(&mut *self.memory, &self.allocator)?;
        log::debug!(
            "{}: defragmented, moved {moved} of {} allocations, {:#x} bytes free",
            self.label,
            self.inner.handles.live(),
            self.free_space()
        );
        Ok(())
    }

    /// Resolve a handle to the current address of its allocation.
    ///
    /// Returns `None` once the handle has been freed. The address is only
    /// good until the next call that takes `&mut self`.
    pub fn get(&self, handle: Handle) -> Option<usize> {
        self.inner.handles.resolve(handle).map(|(address, _)| address)
    }

    /// The size of a handle's allocation, or `None` once it has been freed.
    pub fn size_of(&self, handle: Handle) -> Option<usize> {
        self.inner.handles.resolve(handle).map(|(_, len)| len)
    }

    fn range_of(&self, handle: Handle) -> Option<Range<usize>> {
        let (address, len) = self.inner.handles.resolve(handle)?;
        let start = address - self.base();
        Some(start..start + len)
    }

    /// The bytes of a handle's allocation, wherever they are now.
    pub fn bytes(&self, handle: Handle) -> Option<&[u8]> {
        let range = self.range_of(handle)?;
        Some(&self.memory[range])
    }

    /// The bytes of a handle's allocation, wherever they are now.
    pub fn bytes_mut(&mut self, handle: Handle) -> Option<&mut [u8]> {
        let range = self.range_of(handle)?;
        Some(&mut self.memory[range])
    }

    /// Copy `data` to the start of a handle's allocation.
    ///
    /// # Returns
    /// - [`Error::BufferOverflow`] - `data` is empty, or longer than the
    ///   allocation. Nothing is written.
    /// - [`Error::NoSuchAllocation`] - the handle has been freed.
    pub fn set(&mut self, handle: Handle, data: &[u8]) -> error::Result<()> {
        let bytes = self.bytes_mut(handle).ok_or(Error::NoSuchAllocation)?;
        if data.is_empty() || data.len() > bytes.len() {
            return Err(Error::BufferOverflow);
        }
        bytes[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Iterate over every extent of the arena, in address order.
    pub fn extents(&self) -> Extents<'_, HANDLES> {
        Extents {
            iter: unsafe { self.inner.segment_list.iter() },
            handles: &self.inner.handles,
        }
    }

    /// Render the heap's layout for debugging. The [`Debug`] implementation
    /// prints the same thing.
    pub fn dump(&self) -> Dump<'_, HANDLES> {
        Dump {
            label: self.label,
            base: self.base(),
            capacity: self.capacity(),
            extents: self.extents(),
        }
    }

    /// Get the total space contained in this heap. This is the length of the
    /// arena.
    pub fn total_space(&self) -> usize {
        self.capacity()
    }

    /// Get the allocated space contained in this heap.
    ///
    /// Note that this iterates every extent, and as such is not incredibly
    /// performant.
    pub fn allocated_space(&self) -> usize {
        self.extents()
            .filter(|extent| !extent.is_free())
            .fold(0, |acc, extent| acc + extent.len)
    }

    /// Get the free space contained in this heap.
    ///
    /// Note that this iterates every extent, and as such is not incredibly
    /// performant.
    pub fn free_space(&self) -> usize {
        self.extents()
            .filter(Extent::is_free)
            .fold(0, |acc, extent| acc + extent.len)
    }

    /// Address of the first byte of the arena.
    pub fn base(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    /// Length of the arena.
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Get the label for this heap.
    pub fn label(&self) -> &'label str {
        self.label
    }
}
impl<'label, 'mem, A: alloc::Allocator, const HANDLES: usize> Debug
    for Heap<'label, 'mem, A, HANDLES>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.dump(), f)
    }
}
impl<'label, 'mem, A: alloc::Allocator, const HANDLES: usize> Drop
    for Heap<'label, 'mem, A, HANDLES>
{
    fn drop(&mut self) {
        for bt in unsafe { self.inner.segment_list.iter() } {
            unsafe {
                self.allocator.deallocate(bt);
            }
        }
    }
}

/// Iterator over the extents of a [`Heap`], in address order. See
/// [`Heap::extents`].
pub struct Extents<'a, const HANDLES: usize> {
    iter: AddressListIter,
    handles: &'a HandleTable<HANDLES>,
}
impl<'a, const HANDLES: usize> Iterator for Extents<'a, HANDLES> {
    type Item = Extent;

    fn next(&mut self) -> Option<Self::Item> {
        let bt = unsafe { self.iter.next()?.as_ref() };
        let kind = match bt.ty {
            Type::Free => ExtentKind::Free,
            Type::Allocated => ExtentKind::Allocated(self.handles.handle_at(bt.slot)),
        };
        Some(Extent {
            base: bt.base,
            len: bt.len,
            kind,
        })
    }
}
impl<'a, const HANDLES: usize> Clone for Extents<'a, HANDLES> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
            handles: self.handles,
        }
    }
}

/// A printable snapshot of a [`Heap`]'s layout. See [`Heap::dump`].
pub struct Dump<'a, const HANDLES: usize> {
    label: &'a str,
    base: usize,
    capacity: usize,
    extents: Extents<'a, HANDLES>,
}
impl<'a, const HANDLES: usize> Display for Dump<'a, HANDLES> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(
            f,
            "Heap {} at {:#x} (len: {:#x}) with:",
            self.label, self.base, self.capacity
        )?;
        for extent in self.extents.clone() {
            writeln!(f, "  {extent:?}")?;
        }
        Ok(())
    }
}

struct HeapInner<const HANDLES: usize> {
    segment_list: AddressList,
    freelists: Freelists,
    allocation_table: AllocationTable,
    handles: HandleTable<HANDLES>,
}
impl<const HANDLES: usize> HeapInner<HANDLES> {
    /// Shrink `bt` to `size`, putting the rest back into the free set.
    fn split(
        &mut self,
        size: usize,
        mut bt: NonNull<Bt>,
        allocator: &impl alloc::Allocator,
    ) -> error::Result<()> {
        let (base, len) = {
            let bt = unsafe { bt.as_ref() };
            (bt.base, bt.len)
        };
        if len == size {
            return Ok(());
        }

        let after_split = allocator.allocate().ok_or(Error::AllocatorError)?;
        unsafe { after_split.as_ptr().write(Bt::free(base + size, len - size)) }
        unsafe { bt.as_mut() }.len = size;
        unsafe {
            self.segment_list.insert_after(after_split, bt);
            self.freelists.insert(after_split);
        }

        Ok(())
    }

    fn alloc(
        &mut self,
        size: usize,
        allocator: &impl alloc::Allocator,
    ) -> error::Result<(Handle, usize)> {
        let slot = self.handles.vacant().ok_or(Error::OutOfHandles)?;
        let mut bt = unsafe { self.freelists.take_best_fit(size) }.ok_or(Error::OutOfMemory)?;

        self.split(size, bt, allocator).map_err(|e| {
            unsafe {
                self.freelists.insert(bt);
            }
            e
        })?;

        let base = {
            let bt = unsafe { bt.as_mut() };
            bt.ty = Type::Allocated;
            bt.slot = slot;
            bt.base
        };
        unsafe {
            self.allocation_table.insert(bt);
        }

        Ok((self.handles.create(slot, base, size), base))
    }

    fn free(
        &mut self,
        handle: Handle,
        allocator: &impl alloc::Allocator,
    ) -> error::Result<(usize, usize)> {
        let (base, len) = self
            .handles
            .resolve(handle)
            .ok_or(Error::NoSuchAllocation)?;
        let mut bt =
            unsafe { self.allocation_table.remove(base) }.ok_or(Error::NoSuchAllocation)?;
        unsafe { bt.as_mut() }.ty = Type::Free;

        // Only the extent after this one is merged; a free extent directly
        // before it stays separate until the next defrag.
        match unsafe { bt.as_ref() }.link.next {
            Some(next)
                if unsafe { next.as_ref() }.is_free()
                    && unsafe { bt.as_ref() }.end() == unsafe { next.as_ref() }.base =>
            {
                unsafe {
                    self.freelists.remove(next);
                    self.segment_list.remove(next);
                }
                unsafe { bt.as_mut() }.len += unsafe { next.as_ref() }.len;
                unsafe {
                    allocator.deallocate(next);
                }
            }
            _ => {}
        }

        unsafe {
            self.freelists.insert(bt);
        }
        self.handles.invalidate(handle.index());

        Ok((base, len))
    }

    /// Returns the number of allocations that changed address.
    fn defrag(
        &mut self,
        memory: &mut [u8],
        allocator: &impl alloc::Allocator,
    ) -> error::Result<usize> {
        let base = memory.as_ptr() as usize;
        let end = base + memory.len();
        let mut cursor = base;
        let mut spare: Option<NonNull<Bt>> = None;
        let mut moved = 0;

        let mut next = self.segment_list.first();
        while let Some(mut bt) = next {
            next = unsafe { bt.as_ref() }.link.next;

            if unsafe { bt.as_ref() }.is_free() {
                unsafe {
                    self.freelists.remove(bt);
                    self.segment_list.remove(bt);
                }
                if let Some(extra) = spare.replace(bt) {
                    unsafe {
                        allocator.deallocate(extra);
                    }
                }
                continue;
            }

            let (old, len) = {
                let bt = unsafe { bt.as_ref() };
                (bt.base, bt.len)
            };
            if old != cursor {
                // Extents only ever move down, and everything above `old`
                // has not been touched yet.
                memory.copy_within(old - base..old - base + len, cursor - base);
                let slot = {
                    let bt = unsafe { bt.as_mut() };
                    bt.base = cursor;
                    bt.slot
                };
                unsafe {
                    self.allocation_table.rekey(bt, old);
                }
                self.handles.redirect(slot, cursor);
                moved += 1;
            }
            cursor += len;
        }

        if cursor < end {
            let bt = match spare.take() {
                Some(bt) => bt,
                None => allocator.allocate().ok_or(Error::AllocatorError)?,
            };
            unsafe {
                bt.as_ptr().write(Bt::free(cursor, end - cursor));
                self.segment_list.push_back(bt);
                self.freelists.insert(bt);
            }
        }
        if let Some(bt) = spare {
            unsafe {
                allocator.deallocate(bt);
            }
        }

        Ok(moved)
    }
}
