//! Error types used across the crate.

use core::fmt::Display;

/// [`core::result::Result`] with [`Error`] as the error type.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
/// An error returned from a function in this crate.
pub enum Error {
    /// The boundary tag allocator could not provide a tag.
    AllocatorError,
    /// No free extent is large enough for the request.
    OutOfMemory,
    /// The handle does not refer to a live allocation. It was either freed
    /// already, or it was never handed out by this heap.
    NoSuchAllocation,
    /// A write through a handle was empty, or larger than the extent it
    /// refers to.
    BufferOverflow,
    /// Attempted to allocate a zero-sized block, or to create a heap over an
    /// empty arena.
    AllocZeroSize,
    /// Every slot of the handle table is in use.
    OutOfHandles,
}
impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AllocatorError => write!(f, "the allocator returned an error"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::NoSuchAllocation => write!(f, "no such allocation"),
            Self::BufferOverflow => write!(f, "write does not fit the allocated block"),
            Self::AllocZeroSize => write!(f, "attempted to allocate a zero-sized block"),
            Self::OutOfHandles => write!(f, "no free handle slots"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for Error {}
