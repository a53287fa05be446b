use core::ptr::NonNull;

use crate::bt::{Bt, Link};

/// Every tag of the heap, free or allocated, ordered by address.
pub struct AddressList {
    root: Link,
}
impl AddressList {
    pub const EMPTY: Self = Self {
        root: Link::UNLINKED,
    };

    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    /// The supplied bt must also be valid, as must `prev` and `next`.
    unsafe fn insert_between(
        &mut self,
        mut bt: NonNull<Bt>,
        prev: Option<NonNull<Bt>>,
        next: Option<NonNull<Bt>>,
    ) {
        bt.as_mut().link.prev = prev;
        bt.as_mut().link.next = next;
        if let Some(mut prev) = prev {
            prev.as_mut().link.next = Some(bt);
        } else {
            self.root.next = Some(bt);
        }
        if let Some(mut next) = next {
            next.as_mut().link.prev = Some(bt);
        } else {
            self.root.prev = Some(bt);
        }
    }

    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    /// Both supplied bts must also be valid.
    pub unsafe fn insert_after(&mut self, bt: NonNull<Bt>, prev: NonNull<Bt>) {
        let next = prev.as_ref().link.next;
        self.insert_between(bt, Some(prev), next);
    }

    /// Append a tag past the current highest address.
    ///
    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    /// The supplied bt must also be valid.
    pub unsafe fn push_back(&mut self, bt: NonNull<Bt>) {
        let last = self.root.prev;
        self.insert_between(bt, last, None);
    }

    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    pub unsafe fn remove(&mut self, mut bt: NonNull<Bt>) {
        if let Some(mut prev) = bt.as_ref().link.prev {
            prev.as_mut().link.next = bt.as_ref().link.next;
        } else {
            self.root.next = bt.as_ref().link.next;
        }
        if let Some(mut next) = bt.as_ref().link.next {
            next.as_mut().link.prev = bt.as_ref().link.prev;
        } else {
            self.root.prev = bt.as_ref().link.prev;
        }
        bt.as_mut().link = Link::UNLINKED;
    }

    pub fn first(&self) -> Option<NonNull<Bt>> {
        self.root.next
    }

    /// # Safety
    /// No bt in the list may have a current mutable reference,
    /// but all must be valid.
    pub unsafe fn iter(&self) -> AddressListIter {
        AddressListIter {
            next: self.root.next,
        }
    }
}
impl Default for AddressList {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Clone)]
pub struct AddressListIter {
    next: Option<NonNull<Bt>>,
}
impl Iterator for AddressListIter {
    type Item = NonNull<Bt>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next;
        if let Some(next) = next {
            self.next = unsafe { next.as_ref().link.next };
        }
        next
    }
}

/// An unordered list threaded through the `special` link of each tag. Used
/// both for size classes and for allocation table buckets; a tag is in at
/// most one of them at a time.
pub struct Bucket {
    link: Link,
}
impl Bucket {
    pub const EMPTY: Self = Self {
        link: Link::UNLINKED,
    };

    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    /// The supplied bt must also be valid.
    pub unsafe fn insert(&mut self, mut bt: NonNull<Bt>) {
        bt.as_mut().special.prev = None;
        bt.as_mut().special.next = self.link.next;
        if let Some(mut next) = self.link.next {
            next.as_mut().special.prev = Some(bt);
        }
        self.link.next = Some(bt);
    }

    /// # Safety
    /// No bt in the list may be currently in use, but all must be valid.
    /// The supplied bt must be a member of this bucket.
    pub unsafe fn remove(&mut self, mut bt: NonNull<Bt>) {
        if let Some(mut prev) = bt.as_ref().special.prev {
            prev.as_mut().special.next = bt.as_ref().special.next;
        } else {
            self.link.next = bt.as_ref().special.next;
        }
        if let Some(mut next) = bt.as_ref().special.next {
            next.as_mut().special.prev = bt.as_ref().special.prev;
        }
        bt.as_mut().special = Link::UNLINKED;
    }

    /// # Safety
    /// No bt in the list may have a current mutable reference,
    /// but all must be valid.
    pub unsafe fn iter(&self) -> BucketIter {
        BucketIter {
            next: self.link.next,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.link.next.is_none()
    }
}
impl Default for Bucket {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub struct BucketIter {
    next: Option<NonNull<Bt>>,
}
impl Iterator for BucketIter {
    type Item = NonNull<Bt>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next;
        if let Some(next) = next {
            self.next = unsafe { next.as_ref().special.next };
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(base: usize, len: usize) -> NonNull<Bt> {
        NonNull::from(Box::leak(Box::new(Bt::free(base, len))))
    }

    fn release(bt: NonNull<Bt>) {
        drop(unsafe { Box::from_raw(bt.as_ptr()) });
    }

    #[test]
    fn address_list_keeps_order() {
        let mut list = AddressList::EMPTY;
        let a = tag(0x00, 0x10);
        let c = tag(0x20, 0x10);
        let b = tag(0x10, 0x10);
        unsafe {
            list.push_back(a);
            list.push_back(c);
            list.insert_after(b, a);
        }
        let bases: Vec<_> = unsafe { list.iter() }
            .map(|bt| unsafe { bt.as_ref() }.base)
            .collect();
        assert_eq!(bases, [0x00, 0x10, 0x20]);

        unsafe { list.remove(c) };
        let d = tag(0x30, 0x10);
        unsafe { list.push_back(d) };
        let bases: Vec<_> = unsafe { list.iter() }
            .map(|bt| unsafe { bt.as_ref() }.base)
            .collect();
        assert_eq!(bases, [0x00, 0x10, 0x30]);

        for bt in [a, b, c, d] {
            release(bt);
        }
    }

    #[test]
    fn bucket_insert_remove() {
        let mut bucket = Bucket::EMPTY;
        assert!(bucket.is_empty());
        let a = tag(0x00, 0x10);
        let b = tag(0x10, 0x10);
        unsafe {
            bucket.insert(a);
            bucket.insert(b);
            bucket.remove(a);
        }
        assert_eq!(unsafe { bucket.iter() }.collect::<Vec<_>>(), [b]);
        unsafe { bucket.remove(b) };
        assert!(bucket.is_empty());
        release(a);
        release(b);
    }
}
