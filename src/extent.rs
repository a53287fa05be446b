//! A read-only view of the heap's layout.

use core::fmt::Debug;

use crate::handle::Handle;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
/// What an [`Extent`] is currently used for.
pub enum ExtentKind {
    /// Available for allocation.
    Free,
    /// Backing a live allocation, owned by the given handle.
    Allocated(Handle),
}

#[derive(PartialEq, Eq, Clone, Copy)]
/// A contiguous range of the arena, either free or allocated.
///
/// Extents returned by [`Heap::extents`](crate::Heap::extents) are ordered by
/// address and partition the arena exactly.
pub struct Extent {
    /// Address of the first byte.
    pub base: usize,
    /// Number of bytes.
    pub len: usize,
    /// Whether the extent is free, and who owns it if not.
    pub kind: ExtentKind,
}
impl Extent {
    /// Address one past the last byte.
    pub fn end(&self) -> usize {
        self.base + self.len
    }

    /// Whether the extent is free.
    pub fn is_free(&self) -> bool {
        self.kind == ExtentKind::Free
    }
}
impl Debug for Extent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            ExtentKind::Free => write!(f, "Free")?,
            ExtentKind::Allocated(handle) => write!(f, "Allocated {handle}")?,
        }
        write!(
            f,
            " from {:#x} to {:#x} (len: {:#x})",
            self.base,
            self.end(),
            self.len
        )
    }
}
