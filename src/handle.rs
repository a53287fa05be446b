//! Relocatable handles.
//!
//! A [`Handle`] is what a client holds instead of an address. It names a slot
//! in the heap's handle table, and the slot stores where the allocation lives
//! right now. When the heap moves an allocation it rewrites the slot, so every
//! copy of the handle follows it. When an allocation is freed the slot's
//! generation is bumped, and every copy of the old handle stops resolving,
//! even after the slot is reused for something else. A handle also records
//! the base of the arena it was issued for, so another heap never resolves it.

use core::fmt::{Debug, Display};

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
/// A reference to an allocation that stays valid while the heap relocates it.
///
/// Handles are plain values. Copying one does not copy the allocation; all
/// copies refer to the same slot and observe the same moves and the same
/// free.
pub struct Handle {
    arena: usize,
    index: u32,
    generation: u32,
}
impl Handle {
    /// Base address of the arena of the heap that issued this handle.
    pub fn arena(&self) -> usize {
        self.arena
    }

    /// The slot this handle refers to.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of the slot this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
impl Debug for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
impl Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy)]
struct Slot {
    generation: u32,
    /// `(address, len)` of the live extent, `None` once freed.
    extent: Option<(usize, usize)>,
}
impl Slot {
    const VACANT: Self = Self {
        generation: 0,
        extent: None,
    };
}

/// Fixed-capacity table of handle slots. Only the heap writes to it.
///
/// `arena` is the base of the heap's memory. Two live heaps never share one,
/// since their arenas are non-empty and disjoint.
pub struct HandleTable<const N: usize> {
    arena: usize,
    slots: [Slot; N],
}
impl<const N: usize> HandleTable<N> {
    pub const fn new(arena: usize) -> Self {
        Self {
            arena,
            slots: [Slot::VACANT; N],
        }
    }

    /// The lowest-index vacant slot, if any. Nothing is claimed yet.
    pub fn vacant(&self) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.extent.is_none())
            .and_then(|index| u32::try_from(index).ok())
    }

    /// Claim a slot previously returned by [`vacant`](Self::vacant).
    pub fn create(&mut self, index: u32, address: usize, len: usize) -> Handle {
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.extent.is_none());
        slot.extent = Some((address, len));
        Handle {
            arena: self.arena,
            index,
            generation: slot.generation,
        }
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        if handle.arena != self.arena {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// The current `(address, len)` of the handle's extent, or `None` if
    /// the handle is stale or foreign.
    pub fn resolve(&self, handle: Handle) -> Option<(usize, usize)> {
        self.slot(handle)?.extent
    }

    /// The live handle for an occupied slot.
    pub fn handle_at(&self, index: u32) -> Handle {
        Handle {
            arena: self.arena,
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Point an occupied slot at the new address of its extent.
    pub fn redirect(&mut self, index: u32, address: usize) {
        if let Some((current, _)) = &mut self.slots[index as usize].extent {
            *current = address;
        }
    }

    /// Vacate a slot. Every handle issued for it stops resolving.
    pub fn invalidate(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.extent = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.extent.is_some()).count()
    }
}
