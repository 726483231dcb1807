//! Append-only slot storage with interior mutability. The capacity is
//! fixed at construction and pushes beyond it are refused, hence the
//! backing buffer never reallocates and shared references to stored
//! items stay valid while further items are appended. Clearing
//! requires exclusive access, which proves no such references remain.

use std::cell::UnsafeCell;

pub struct StillVec<T>(UnsafeCell<Vec<T>>);

impl<T> StillVec<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Self(UnsafeCell::new(Vec::with_capacity(cap)))
    }

    /// The next free slot index.
    pub fn len(&self) -> usize {
        let p = self.0.get();
        // Safe: StillVec is not Sync, no concurrent mutation possible.
        unsafe { &*p }.len()
    }

    pub fn capacity(&self) -> usize {
        let p = self.0.get();
        // Safe: there is no API that changes the capacity.
        unsafe { &*p }.capacity()
    }

    /// Append `value` if a free slot is left, otherwise hand it back.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let p = self.0.get();
        // Safe: the capacity check below means push never reallocates,
        // so references from `get` are not invalidated; and not Sync.
        let v = unsafe { &mut *p };
        if v.len() < v.capacity() {
            v.push(value);
            Ok(())
        } else {
            Err(value)
        }
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        let p = self.0.get();
        // Safe: slots are never mutated or moved once written (no
        // reallocation, no non-exclusive clear).
        unsafe { &*p }.get(i)
    }

    /// `&mut self` guarantees no reference from `get` survives.
    pub fn exclusive_clear(&mut self) {
        self.0.get_mut().clear()
    }
}
