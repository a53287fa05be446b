use core::{
    fmt::{Debug, Display},
    ptr::NonNull,
};

/// A boundary tag.
///
/// The actual contents is irrelevant. This type should not be
/// directly manipulated. It is only provided to facilitate implementations of
/// the [`Allocator`](crate::alloc::Allocator) trait.
pub struct Bt {
    pub(crate) link: Link,
    pub(crate) base: usize,
    pub(crate) len: usize,
    pub(crate) special: Link,
    pub(crate) ty: Type,
    /// Index of the owning handle slot. Only meaningful while allocated.
    pub(crate) slot: u32,
}
impl Bt {
    pub(crate) const fn free(base: usize, len: usize) -> Self {
        Self {
            link: Link::UNLINKED,
            base,
            len,
            special: Link::UNLINKED,
            ty: Type::Free,
            slot: 0,
        }
    }

    pub(crate) fn end(&self) -> usize {
        self.base + self.len
    }

    pub(crate) fn is_free(&self) -> bool {
        self.ty == Type::Free
    }
}
impl Debug for Bt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} from {:#x} to {:#x} (len: {:#x})",
            self.ty,
            self.base,
            self.end(),
            self.len
        )
    }
}

pub struct Link {
    pub prev: Option<NonNull<Bt>>,
    pub next: Option<NonNull<Bt>>,
}
impl Link {
    pub const UNLINKED: Self = Link {
        prev: None,
        next: None,
    };
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub enum Type {
    Free,
    Allocated,
}
impl Display for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Allocated => write!(f, "Allocated"),
        }
    }
}
