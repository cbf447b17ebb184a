use std::fmt::Debug;

use crate::sync::atomic;

/// A single Record in the List of Hazard-Pointer-Records
pub struct Record {
    /// The currently protected Ptr, if the Record does not protect anything
    /// this is a Null-Ptr
    pub ptr: atomic::AtomicPtr<()>,
    /// The Pointer to the next Record in the Linked-List
    pub next: atomic::AtomicPtr<Record>,
}

impl Record {
    /// Creates a new Empty Record, which can be appended to the List
    /// of Records
    pub fn boxed_empty() -> Box<Self> {
        Box::new(Self {
            ptr: atomic::AtomicPtr::new(std::ptr::null_mut()),
            next: atomic::AtomicPtr::new(std::ptr::null_mut()),
        })
    }

    /// Attempts to load the next Record in the Linked-List, returns None if
    /// this is currently the last Record.
    pub fn load_next(&self, order: atomic::Ordering) -> Option<&Self> {
        let ptr = self.next.load(order);
        if ptr.is_null() {
            return None;
        }

        // # Safety:
        // Records are only ever appended to the List and are not freed before
        // the owning DomainGlobal is dropped, which can only happen once
        // there are no more borrows of any Record
        Some(unsafe { &*ptr })
    }

    /// Publishes the given Ptr as being protected by this Record
    pub fn publish(&self, ptr: *mut ()) {
        self.ptr.store(ptr, atomic::Ordering::SeqCst);
    }

    /// This resets the Hazard-Record to its empty initial State, where it
    /// does not actually protect any Memory and is ready to be acquired and
    /// used
    pub fn reset(&self) {
        self.ptr
            .store(std::ptr::null_mut(), atomic::Ordering::SeqCst);
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ptr = self.ptr.load(atomic::Ordering::SeqCst);
        let next = self.next.load(atomic::Ordering::SeqCst);
        write!(f, "Record ( ptr = {:p}, next = {:p} )", ptr, next)
    }
}
