mod global;
pub use global::DomainGlobal;

use std::{cell::RefCell, fmt::Debug};

use crate::{sync::atomic, trace::debug};

use super::record::Record;

/// The Thread-Local part of a Hazard-Domain.
///
/// Every Thread caches the Records it acquired once, so that protecting a
/// Ptr does not need to walk or grow the global List of Records, and keeps
/// its own List of retired Ptrs that are not yet safe to reclaim.
pub struct LocalDomain<T> {
    /// Records that belong to this Thread but are not used by any Guard
    free_records: RefCell<Vec<*const Record>>,
    /// The retired Ptrs, which might still be protected by another Thread
    r_list: RefCell<Vec<*mut T>>,
}

// # Safety:
// The Ptrs stored in a LocalDomain are only ever touched by the Thread that
// owns it, or through `&mut` access to the whole Domain which guarantees that
// no other Thread is using it at the same time
unsafe impl<T> Send for LocalDomain<T> {}

impl<T> Debug for LocalDomain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LocalDomain ( free_records = {}, retired = {} )",
            self.free_records.borrow().len(),
            self.r_list.borrow().len()
        )
    }
}

impl<T> LocalDomain<T> {
    /// Creates a new empty Thread-Local Domain
    pub fn new() -> Self {
        Self {
            free_records: RefCell::new(Vec::new()),
            r_list: RefCell::new(Vec::new()),
        }
    }

    /// Gets an unused Record for this Thread, either one that was used before
    /// or a new Record that gets appended to the global List
    pub fn acquire_record<'g>(&self, global: &'g DomainGlobal) -> &'g Record {
        match self.free_records.borrow_mut().pop() {
            // # Safety:
            // Records live as long as the DomainGlobal they were added to
            Some(record) => unsafe { &*record },
            None => global.append_record(Record::boxed_empty()),
        }
    }

    /// Clears the given Record and makes it available for the next Guard on
    /// this Thread
    pub fn release_record(&self, record: &Record) {
        record.reset();
        self.free_records.borrow_mut().push(record as *const Record);
    }

    /// Adds the Ptr to the List of retired Ptrs and performs a Scan once the
    /// List has grown to the given Threshold
    pub fn retire_node<F>(&self, global: &DomainGlobal, node: *mut T, threshold: usize, reclaim: F)
    where
        F: FnMut(*mut T),
    {
        let r_count = {
            let mut r_list = self.r_list.borrow_mut();
            r_list.push(node);
            r_list.len()
        };

        if r_count >= threshold {
            self.scan(global, reclaim);
        }
    }

    /// Passes every retired Ptr that is not protected by any Record to the
    /// `reclaim` function and removes it from the List of retired Ptrs.
    ///
    /// # Returns
    /// The Number of reclaimed Ptrs
    pub fn scan<F>(&self, global: &DomainGlobal, mut reclaim: F) -> usize
    where
        F: FnMut(*mut T),
    {
        // The Ptrs were unlinked with weaker Orderings than SeqCst, so the
        // unlinking is only ordered before the Record-Loads by this Fence
        atomic::fence(atomic::Ordering::SeqCst);
        let plist = global.get_protections();

        let mut r_list = self.r_list.borrow_mut();
        let retired = r_list.len();
        r_list.retain(|node| {
            if plist.contains(&(*node as *const ())) {
                return true;
            }

            reclaim(*node);
            false
        });

        let reclaimed = retired - r_list.len();
        debug!(retired, reclaimed, protected = plist.len(), "hazard scan");
        reclaimed
    }

    /// The Number of Ptrs currently waiting to be reclaimed
    pub fn retired_count(&self) -> usize {
        self.r_list.borrow().len()
    }

    /// Removes all the retired Ptrs, without checking the Hazard-Records
    pub fn drain<F>(&mut self, reclaim: &mut F)
    where
        F: FnMut(*mut T),
    {
        for node in self.r_list.get_mut().drain(..) {
            reclaim(node);
        }
    }
}

impl<T> Default for LocalDomain<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn reuses_records() {
        let global = DomainGlobal::new();
        let local = LocalDomain::<u64>::new();

        let first = local.acquire_record(&global) as *const Record;
        local.release_record(unsafe { &*first });

        let second = local.acquire_record(&global) as *const Record;
        assert_eq!(first, second);
        assert_eq!(1, global.record_count());
    }

    #[test]
    fn scan_keeps_protected() {
        let global = DomainGlobal::new();
        let local = LocalDomain::<u64>::new();

        let mut protected_value = 1_u64;
        let mut free_value = 2_u64;
        let protected_ptr = &mut protected_value as *mut u64;
        let free_ptr = &mut free_value as *mut u64;

        let record = local.acquire_record(&global);
        record.publish(protected_ptr as *mut ());

        let mut reclaimed = Vec::new();
        local.retire_node(&global, protected_ptr, 10, |ptr| reclaimed.push(ptr));
        local.retire_node(&global, free_ptr, 10, |ptr| reclaimed.push(ptr));
        assert!(reclaimed.is_empty());

        assert_eq!(1, local.scan(&global, |ptr| reclaimed.push(ptr)));
        assert_eq!(vec![free_ptr], reclaimed);
        assert_eq!(1, local.retired_count());

        local.release_record(record);
        assert_eq!(1, local.scan(&global, |ptr| reclaimed.push(ptr)));
        assert_eq!(vec![free_ptr, protected_ptr], reclaimed);
        assert_eq!(0, local.retired_count());
    }

    #[test]
    fn retire_scans_at_threshold() {
        let global = DomainGlobal::new();
        let local = LocalDomain::<u64>::new();

        let mut values = [0_u64; 3];
        let mut reclaimed = 0;
        for value in values.iter_mut() {
            local.retire_node(&global, value as *mut u64, 3, |_| reclaimed += 1);
        }

        assert_eq!(3, reclaimed);
        assert_eq!(0, local.retired_count());
    }
}
