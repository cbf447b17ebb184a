//! A simple implementation of Hazard-Pointers, with a separate Domain for
//! every Datastructure that uses them.
//!
//! Retired Ptrs are not freed by the Domain itself, instead they are handed
//! to a `reclaim` function once no Hazard-Pointer protects them anymore. This
//! allows the Queue to recycle its Nodes instead of freeing them.
//!
//! # Reference:
//! * [Hazard Pointers: Safe Memory Reclamation for Lock-Free Objects](https://www.eecg.utoronto.ca/~amza/ece1747h/papers/hazard_pointers.pdf)

mod record;

mod domain;
use domain::{DomainGlobal, LocalDomain};

mod guard;
pub use guard::Guard;

use std::fmt::Debug;

use crate::sync::{atomic, ThreadLocal};

/// A Hazard-Pointer Domain.
///
/// The Domain only protects and reclaims Ptrs of a single Type `T`, which
/// keeps the Domains of different Datastructures apart and means that a Scan
/// only has to check the Hazard-Pointers that are relevant for it.
pub struct Domain<T> {
    global: DomainGlobal,
    local: ThreadLocal<LocalDomain<T>>,
    reclaim_threshold: usize,
}

impl<T> Debug for Domain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Domain<{}> (reclaim_threshold: {}, records: {})",
            std::any::type_name::<T>(),
            self.reclaim_threshold,
            self.global.record_count()
        )
    }
}

impl<T> Domain<T> {
    /// Creates a new Domain, which will attempt to reclaim the retired Ptrs
    /// of a Thread once it has retired `reclaim_threshold` Ptrs.
    ///
    /// A Threshold of 0 is treated as 1.
    pub fn new(reclaim_threshold: usize) -> Self {
        Self {
            global: DomainGlobal::new(),
            local: ThreadLocal::new(),
            reclaim_threshold: reclaim_threshold.max(1),
        }
    }

    fn get_local(&self) -> &LocalDomain<T> {
        self.local.get_or(LocalDomain::new)
    }

    /// The configured reclaim Threshold
    pub fn reclaim_threshold(&self) -> usize {
        self.reclaim_threshold
    }

    /// Creates a new empty Guard, that can then be used to protect any Ptr
    /// stored in an AtomicPtr.
    pub fn empty_guard(&self) -> Guard<'_, T> {
        let local = self.get_local();
        let record = local.acquire_record(&self.global);
        Guard::new(record, local)
    }

    /// Reads the Ptr from the given AtomicPtr and protects it using a Hazard-
    /// Ptr.
    ///
    /// As long as the returned Guard lives, the Ptr will not be passed to
    /// any `reclaim` function of this Domain.
    pub fn protect(&self, atom_ptr: &atomic::AtomicPtr<T>) -> Guard<'_, T> {
        let mut guard = self.empty_guard();
        guard.protect(atom_ptr);
        guard
    }

    /// Marks the given Ptr as retired. Once it is no longer protected by any
    /// Hazard-Pointer in this Domain, it will be passed to `reclaim` during
    /// one of the later Scans of the current Thread.
    ///
    /// # Safety
    /// The Ptr must no longer be reachable from the shared Datastructure, so
    /// that no new Hazard-Pointer can start protecting it, and it must only
    /// be retired once.
    pub unsafe fn retire<F>(&self, ptr: *mut T, reclaim: F)
    where
        F: FnMut(*mut T),
    {
        let local = self.get_local();
        local.retire_node(&self.global, ptr, self.reclaim_threshold, reclaim);
    }

    /// Forces a reclaimation Scan for the current Thread, however this does
    /// not guarantee that any Ptrs will actually be reclaimed, as they
    /// might all still be protected.
    ///
    /// # Returns
    /// The Number of reclaimed Ptrs
    pub fn reclaim<F>(&self, reclaim: F) -> usize
    where
        F: FnMut(*mut T),
    {
        let local = self.get_local();
        local.scan(&self.global, reclaim)
    }

    /// The Number of Ptrs retired by the current Thread, which still wait to
    /// be reclaimed
    pub fn retired_count(&self) -> usize {
        self.local.get().map(|l| l.retired_count()).unwrap_or(0)
    }

    /// Hands every retired Ptr of every Thread to `reclaim`, regardless of
    /// the Hazard-Pointers.
    ///
    /// This needs exclusive access to the Domain, which means that there can
    /// not be any Guard alive at this Point.
    pub fn drain<F>(&mut self, mut reclaim: F)
    where
        F: FnMut(*mut T),
    {
        for local in self.local.iter_mut() {
            local.drain(&mut reclaim);
        }
    }
}
