use std::fmt::Debug;

use crate::sync::atomic;

use super::{domain::LocalDomain, record::Record};

/// A Guard protects a single Memory address from being reclaimed, as long as
/// the Guard is not dropped
pub struct Guard<'d, T> {
    /// The actual Data-Ptr protected by the Hazard-Ptr
    inner: *mut T,
    /// The Hazard-Record that protects the underlying Data
    record: &'d Record,
    /// The Thread-Local Domain to which the Record is returned once the Guard
    /// is dropped
    local: &'d LocalDomain<T>,
}

impl<'d, T> Debug for Guard<'d, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guard ( ptr = {:p} )", self.inner)
    }
}

impl<'d, T> Drop for Guard<'d, T> {
    fn drop(&mut self) {
        self.local.release_record(self.record);
    }
}

impl<'d, T> Guard<'d, T> {
    pub(crate) fn new(record: &'d Record, local: &'d LocalDomain<T>) -> Self {
        Self {
            inner: std::ptr::null_mut(),
            record,
            local,
        }
    }

    /// Gets the underlying PTR to the Data protected by the Guard
    pub fn raw(&self) -> *mut T {
        self.inner
    }

    /// Checks if the Guard currently protects a Null-Ptr
    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    /// Gets a Reference to the protected Data
    ///
    /// # Safety
    /// The Caller must make sure that the protected Ptr had not been retired
    /// at the Point where it was loaded and published by [`Guard::protect`],
    /// usually by validating that the Ptr is still reachable from the
    /// shared Datastructure after protecting it.
    pub unsafe fn as_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Loads the most recent Ptr-Value from the given AtomicPtr and updates
    /// the current Guard to now protect this new Ptr.
    ///
    /// # Behaviour
    /// The AtomicPtr is read again after publishing the Hazard, until both
    /// reads agree, so the returned Ptr was still stored in the AtomicPtr at
    /// a Point where the Hazard was already visible to other Threads.
    pub fn protect(&mut self, atom_ptr: &atomic::AtomicPtr<T>) -> *mut T {
        let mut protect_ptr = atom_ptr.load(atomic::Ordering::SeqCst);
        loop {
            self.record.publish(protect_ptr as *mut ());
            // Pairs with the Fence in the Scan, so either the Scan sees the
            // Hazard or we see the Ptr being unlinked
            atomic::fence(atomic::Ordering::SeqCst);

            let n_ptr = atom_ptr.load(atomic::Ordering::SeqCst);
            if n_ptr == protect_ptr {
                break;
            }

            protect_ptr = n_ptr;
        }

        self.inner = protect_ptr;
        protect_ptr
    }

    /// Stops protecting the current Ptr, while keeping the Record around for
    /// later use
    pub fn reset(&mut self) {
        self.record.reset();
        self.inner = std::ptr::null_mut();
    }
}
