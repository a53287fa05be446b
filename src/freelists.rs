use core::ptr::NonNull;

use crate::{bt::Bt, list::Bucket};

pub const NUM_FREELISTS: usize = usize::BITS as usize;

/// The free set, split into power-of-two size classes. Class `n` holds every
/// free tag whose length lies in `[2^n, 2^(n + 1))`.
pub struct Freelists {
    freelists: [Bucket; NUM_FREELISTS],
}
impl Freelists {
    pub const fn new() -> Self {
        Self {
            freelists: [Bucket::EMPTY; NUM_FREELISTS],
        }
    }

    fn class_of(size: usize) -> usize {
        NUM_FREELISTS - size.leading_zeros() as usize - 1
    }

    /// # Safety
    /// No bt in any of the contained lists may be currently in use,
    /// but all must be valid. The supplied bt must also be valid, and its
    /// length must not change until it is removed again.
    pub unsafe fn insert(&mut self, bt: NonNull<Bt>) {
        let class = Self::class_of(bt.as_ref().len);
        self.freelists[class].insert(bt);
    }

    /// # Safety
    /// No bt in any of the contained lists may be currently in use,
    /// but all must be valid. The supplied bt must be in the free set.
    pub unsafe fn remove(&mut self, bt: NonNull<Bt>) {
        let class = Self::class_of(bt.as_ref().len);
        self.freelists[class].remove(bt);
    }

    /// Remove and return the smallest free tag of at least `size`, preferring
    /// the lowest address among equals.
    ///
    /// Every tag in a higher class is strictly longer than every tag in a
    /// lower one, so the first class with any fit holds the best fit.
    ///
    /// # Safety
    /// No bt in any of the contained lists may be currently in use,
    /// but all must be valid. `size` must be non-zero.
    pub unsafe fn take_best_fit(&mut self, size: usize) -> Option<NonNull<Bt>> {
        for freelist in &mut self.freelists[Self::class_of(size)..] {
            if freelist.is_empty() {
                continue;
            }
            let best = freelist
                .iter()
                .filter(|bt| bt.as_ref().len >= size)
                .min_by_key(|bt| (bt.as_ref().len, bt.as_ref().base));
            if let Some(bt) = best {
                freelist.remove(bt);
                return Some(bt);
            }
        }
        None
    }
}
impl Default for Freelists {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(base: usize, len: usize) -> NonNull<Bt> {
        NonNull::from(Box::leak(Box::new(Bt::free(base, len))))
    }

    #[test]
    fn size_classes() {
        assert_eq!(Freelists::class_of(1), 0);
        assert_eq!(Freelists::class_of(2), 1);
        assert_eq!(Freelists::class_of(3), 1);
        assert_eq!(Freelists::class_of(0x400), 10);
        assert_eq!(Freelists::class_of(usize::MAX), NUM_FREELISTS - 1);
    }

    #[test]
    fn best_fit_prefers_smallest_then_lowest() {
        let mut freelists = Freelists::new();
        let tags = [
            tag(0x400, 0x30),
            tag(0x100, 0x28),
            tag(0x300, 0x28),
            tag(0x000, 0x20),
        ];
        for bt in tags {
            unsafe { freelists.insert(bt) };
        }

        let bt = unsafe { freelists.take_best_fit(0x21) }.unwrap();
        assert_eq!(unsafe { bt.as_ref() }.base, 0x100);
        let bt = unsafe { freelists.take_best_fit(0x21) }.unwrap();
        assert_eq!(unsafe { bt.as_ref() }.base, 0x300);
        let bt = unsafe { freelists.take_best_fit(0x21) }.unwrap();
        assert_eq!(unsafe { bt.as_ref() }.base, 0x400);
        assert!(unsafe { freelists.take_best_fit(0x21) }.is_none());

        let bt = unsafe { freelists.take_best_fit(0x20) }.unwrap();
        assert_eq!(unsafe { bt.as_ref() }.base, 0x000);

        for bt in tags {
            drop(unsafe { Box::from_raw(bt.as_ptr()) });
        }
    }

    #[test]
    fn best_fit_crosses_classes() {
        let mut freelists = Freelists::new();
        let small = tag(0x000, 0x18);
        let large = tag(0x100, 0x80);
        unsafe {
            freelists.insert(small);
            freelists.insert(large);
        }
        // 0x1c shares a class with 0x18 but does not fit it.
        let bt = unsafe { freelists.take_best_fit(0x1c) }.unwrap();
        assert_eq!(bt, large);
        unsafe { freelists.remove(small) };
        assert!(unsafe { freelists.take_best_fit(1) }.is_none());

        for bt in [small, large] {
            drop(unsafe { Box::from_raw(bt.as_ptr()) });
        }
    }
}
