use std::{collections::HashSet, fmt::Debug};

use crate::{hazard_ptr::record::Record, sync::atomic};

/// This represents the Global shared state for a single Hazard-Domain, which
/// is mainly the List of all Hazard-Records in the Domain
pub struct DomainGlobal {
    records: atomic::AtomicPtr<Record>,
}

impl Debug for DomainGlobal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Domain-Global ( records = {} )", self.record_count())
    }
}

impl DomainGlobal {
    /// Creates a new Empty DomainGlobal instance, which has no Hazard-Pointers
    /// to start with
    pub fn new() -> Self {
        Self {
            records: atomic::AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    fn first(&self) -> Option<&Record> {
        let ptr = self.records.load(atomic::Ordering::SeqCst);
        if ptr.is_null() {
            return None;
        }

        // # Safety:
        // Records are never removed from the List while the Global is alive
        Some(unsafe { &*ptr })
    }

    /// Checks all the current Hazard-Records and returns a Set of all
    /// currently protected PTRs stored in them
    pub fn get_protections(&self) -> HashSet<*const ()> {
        let mut plist = HashSet::new();

        let mut current = self.first();
        while let Some(record) = current {
            let ptr_val = record.ptr.load(atomic::Ordering::SeqCst);
            if !ptr_val.is_null() {
                plist.insert(ptr_val as *const ());
            }

            current = record.load_next(atomic::Ordering::SeqCst);
        }

        plist
    }

    /// Adds the given Record to the List of Hazard-Records.
    ///
    /// Records are pushed at the Front, because the Order of the Records does
    /// not matter for the Scan and this only needs a single CAS in the common
    /// case.
    pub fn append_record(&self, n_record: Box<Record>) -> &Record {
        let n_record_ptr = Box::into_raw(n_record);
        // # Safety:
        // We just created the Ptr from a valid Box and it will only be freed
        // once the Global itself is dropped
        let n_record = unsafe { &*n_record_ptr };

        let mut head = self.records.load(atomic::Ordering::SeqCst);
        loop {
            n_record.next.store(head, atomic::Ordering::SeqCst);

            match self.records.compare_exchange(
                head,
                n_record_ptr,
                atomic::Ordering::SeqCst,
                atomic::Ordering::SeqCst,
            ) {
                Ok(_) => return n_record,
                Err(current) => {
                    head = current;
                }
            };
        }
    }

    /// Counts the Records that are currently part of the Domain
    pub fn record_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.first();
        while let Some(record) = current {
            count += 1;
            current = record.load_next(atomic::Ordering::SeqCst);
        }
        count
    }
}

impl Default for DomainGlobal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DomainGlobal {
    fn drop(&mut self) {
        let mut current_ptr = self.records.load(atomic::Ordering::SeqCst);
        while !current_ptr.is_null() {
            // # Safety:
            // We have exclusive access to the Global and every Record in the
            // List was created using `Box::into_raw`
            let current = unsafe { Box::from_raw(current_ptr) };
            current_ptr = current.next.load(atomic::Ordering::SeqCst);
        }
    }
}
