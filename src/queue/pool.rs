//! The Recycling-Pool for the Nodes of the Queue.
//!
//! Reclaimed Nodes are pushed onto a shared [`Stack`]. A Thread that needs a
//! Node first looks into its own Cache and only if that is empty takes the
//! entire shared Stack into its Cache, which keeps the shared Stack free of
//! the usual ABA-Problem on pop and means that most acquisitions only touch
//! Thread-Local state.

mod stack;
use stack::Stack;

use std::{cell::Cell, fmt::Debug};

use crate::{
    queue::node::Node,
    sync::{atomic, ThreadLocal},
    trace::{debug, trace},
};

/// The per-Thread Chain of free Nodes
struct LocalCache<T> {
    head: Cell<*mut Node<T>>,
}

// # Safety:
// The Cache is only accessed by the Thread it belongs to, or through `&mut`
// access to the whole Pool once no other Thread can use it anymore
unsafe impl<T> Send for LocalCache<T> {}

impl<T> LocalCache<T> {
    fn new() -> Self {
        Self {
            head: Cell::new(std::ptr::null_mut()),
        }
    }

    fn pop(&self) -> Option<*mut Node<T>> {
        let head = self.head.get();
        if head.is_null() {
            return None;
        }

        // # Safety:
        // Every Node in the Cache is exclusively owned by it
        let next = unsafe { (*head).next.load(atomic::Ordering::Relaxed) };
        self.head.set(next);
        Some(head)
    }
}

impl<T> Drop for LocalCache<T> {
    fn drop(&mut self) {
        while let Some(node) = self.pop() {
            // # Safety:
            // Nodes in the Cache do not hold any Data and are owned by it
            unsafe { Node::free(node) };
        }
    }
}

/// The Pool of currently unused Nodes
pub struct Pool<T> {
    shared: Stack<T>,
    local: ThreadLocal<LocalCache<T>>,
    allocated: atomic::AtomicUsize,
}

impl<T> Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node-Pool<{}> ( allocated = {} )",
            std::any::type_name::<T>(),
            self.allocated()
        )
    }
}

impl<T> Pool<T> {
    /// Creates a new empty Pool
    pub fn new() -> Self {
        Self {
            shared: Stack::new(),
            local: ThreadLocal::new(),
            allocated: atomic::AtomicUsize::new(0),
        }
    }

    /// Allocates `nodes` new Nodes and places them into the Pool
    pub fn reserve(&self, nodes: usize) {
        for _ in 0..nodes {
            let node = self.allocate();
            // # Safety:
            // The Node was just allocated and is not used anywhere else
            unsafe { self.release(node) };
        }
    }

    fn allocate(&self) -> *mut Node<T> {
        self.allocated.fetch_add(1, atomic::Ordering::Relaxed);
        trace!(total = self.allocated(), "allocating new Node");
        Node::boxed_empty()
    }

    /// Gets a free Node from the Pool or allocates a new one, if there is no
    /// free Node available.
    ///
    /// The returned Node is exclusively owned by the Caller and holds no
    /// Data, but its `next` Ptr still has to be reset before linking it.
    pub fn acquire(&self) -> *mut Node<T> {
        let cache = self.local.get_or(LocalCache::new);
        if let Some(node) = cache.pop() {
            return node;
        }

        let chain = self.shared.take_all();
        if chain.is_null() {
            return self.allocate();
        }

        debug!("refilled Thread-Cache from the shared Node-Stack");

        // # Safety:
        // The whole Chain now belongs to this Thread
        let rest = unsafe { (*chain).next.load(atomic::Ordering::Relaxed) };
        cache.head.set(rest);
        chain
    }

    /// Returns the given Node to the Pool, so it can be handed out again
    ///
    /// # Safety
    /// The Node must not hold any Data, must not be linked into the Queue and
    /// no other Thread may still be able to access it
    pub unsafe fn release(&self, node: *mut Node<T>) {
        self.shared.push(node);
    }

    /// The total Number of Nodes this Pool has allocated so far
    pub fn allocated(&self) -> usize {
        self.allocated.load(atomic::Ordering::Relaxed)
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn acquire_allocates_when_empty() {
        let pool = Pool::<u64>::new();

        let node = pool.acquire();
        assert_eq!(1, pool.allocated());

        unsafe { pool.release(node) };
    }

    #[test]
    fn acquire_reuses_released() {
        let pool = Pool::<u64>::new();

        let node = pool.acquire();
        unsafe { pool.release(node) };

        assert_eq!(node, pool.acquire());
        assert_eq!(1, pool.allocated());

        unsafe { pool.release(node) };
    }

    #[test]
    fn reserve_preallocates() {
        let pool = Pool::<u64>::new();
        pool.reserve(8);
        assert_eq!(8, pool.allocated());

        let nodes: Vec<_> = (0..8).map(|_| pool.acquire()).collect();
        assert_eq!(8, pool.allocated());

        let extra = pool.acquire();
        assert_eq!(9, pool.allocated());

        for node in nodes {
            unsafe { pool.release(node) };
        }
        unsafe { pool.release(extra) };
    }

    #[test]
    fn release_from_other_thread() {
        let pool = std::sync::Arc::new(Pool::<u64>::new());

        let node = pool.acquire() as usize;
        let c_pool = pool.clone();
        std::thread::spawn(move || unsafe { c_pool.release(node as *mut Node<u64>) })
            .join()
            .unwrap();

        assert_eq!(node, pool.acquire() as usize);
        assert_eq!(1, pool.allocated());

        unsafe { pool.release(node as *mut Node<u64>) };
    }
}
