use core::{hash::Hasher, ptr::NonNull};

use rustc_hash::FxHasher;

use crate::{bt::Bt, list::Bucket};

pub const NUM_BUCKETS: usize = 64;

/// Live allocations, keyed by their current base address.
pub struct AllocationTable {
    buckets: [Bucket; NUM_BUCKETS],
}
impl AllocationTable {
    pub const fn new() -> Self {
        Self {
            buckets: [Bucket::EMPTY; NUM_BUCKETS],
        }
    }

    fn bucket_mut(&mut self, base: usize) -> &mut Bucket {
        let mut hasher = FxHasher::default();
        hasher.write_usize(base);
        let hash = hasher.finish() as usize;
        &mut self.buckets[hash % NUM_BUCKETS]
    }

    /// # Safety
    /// No bt in any of the contained lists may be currently in use,
    /// but all must be valid. The supplied bt must also be valid, and its
    /// base must not change until it is removed again.
    pub unsafe fn insert(&mut self, bt: NonNull<Bt>) {
        let base = bt.as_ref().base;
        self.bucket_mut(base).insert(bt);
    }

    /// # Safety
    /// No bt in any of the contained lists may be currently in use,
    /// but all must be valid.
    pub unsafe fn remove(&mut self, base: usize) -> Option<NonNull<Bt>> {
        let bucket = self.bucket_mut(base);
        let bt = bucket.iter().find(|bt| bt.as_ref().base == base)?;
        bucket.remove(bt);
        Some(bt)
    }

    /// Re-key a tag after its base moved from `old_base`.
    ///
    /// # Safety
    /// Same as [`insert`](Self::insert). The tag must currently be filed
    /// under `old_base`.
    pub unsafe fn rekey(&mut self, bt: NonNull<Bt>, old_base: usize) {
        self.bucket_mut(old_base).remove(bt);
        self.insert(bt);
    }
}
impl Default for AllocationTable {
    fn default() -> Self {
        Self::new()
    }
}
