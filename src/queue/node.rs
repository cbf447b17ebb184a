use std::{cell::UnsafeCell, mem::MaybeUninit};

use crate::sync::atomic;

/// A single Cell in the Linked-List of the Queue, which is also reused as an
/// Entry in the Node-Pool
pub struct Node<T> {
    /// The Data stored in the Node, this is only initialized while the Node
    /// is linked into the Queue and has not yet become the Sentinel
    data: UnsafeCell<MaybeUninit<T>>,
    /// The next Node in the Queue or in the Pool
    pub next: atomic::AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    /// Allocates a new Node without any Data and returns the raw Ptr to it
    pub fn boxed_empty() -> *mut Self {
        Box::into_raw(Box::new(Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
            next: atomic::AtomicPtr::new(std::ptr::null_mut()),
        }))
    }

    /// Resets the Successor of the Node and stores the Data in it, so that it
    /// is ready to be linked into the Queue
    ///
    /// # Safety
    /// The Caller must have exclusive access to the Node, meaning that it is
    /// neither linked into the Queue nor part of the Pool
    pub unsafe fn prepare(&self, data: T) {
        self.next
            .store(std::ptr::null_mut(), atomic::Ordering::Relaxed);
        self.data.get().write(MaybeUninit::new(data));
    }

    /// Creates a bitwise Copy of the stored Data, without taking ownership of
    /// it.
    ///
    /// The Copy is only allowed to be turned into a `T` by the one Thread
    /// that actually removed this Node's Data from the Queue, every other
    /// Copy must simply be forgotten.
    ///
    /// # Safety
    /// The Node must be protected from being recycled while this is called
    /// and its Data must have been written before the Node was linked
    pub unsafe fn read_data(&self) -> MaybeUninit<T> {
        self.data.get().read()
    }

    /// Drops the Data stored in the Node in place
    ///
    /// # Safety
    /// The Node must currently hold initialized Data that has not been moved
    /// out of it and no other Thread may access the Node
    pub unsafe fn drop_data(&self) {
        (*self.data.get()).as_mut_ptr().drop_in_place();
    }

    /// Frees the Node itself, without touching its Data
    ///
    /// # Safety
    /// The Ptr must have been created by [`Node::boxed_empty`] and must not be
    /// used after this call
    pub unsafe fn free(ptr: *mut Self) {
        drop(Box::from_raw(ptr));
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn prepare_read() {
        let node_ptr = Node::<u64>::boxed_empty();
        let node = unsafe { &*node_ptr };

        node.next.store(node_ptr, atomic::Ordering::Relaxed);
        unsafe { node.prepare(13) };

        assert!(node.next.load(atomic::Ordering::Relaxed).is_null());
        assert_eq!(13, unsafe { node.read_data().assume_init() });

        unsafe { Node::free(node_ptr) };
    }

    #[test]
    fn drop_data_once() {
        let data = Arc::new(13_u64);

        let node_ptr = Node::<Arc<u64>>::boxed_empty();
        let node = unsafe { &*node_ptr };
        unsafe { node.prepare(data.clone()) };
        assert_eq!(2, Arc::strong_count(&data));

        // A speculative Copy that is forgotten must not drop the Data
        let copy = unsafe { node.read_data() };
        drop(copy);
        assert_eq!(2, Arc::strong_count(&data));

        unsafe { node.drop_data() };
        assert_eq!(1, Arc::strong_count(&data));

        // Freeing the Node itself does not touch the Data again
        unsafe { Node::free(node_ptr) };
        assert_eq!(1, Arc::strong_count(&data));
    }
}
