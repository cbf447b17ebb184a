use std::fmt::Debug;

use crate::{queue::node::Node, sync::atomic};

/// A lock-free Stack of unused Nodes, linked through their `next` Ptr.
///
/// Nodes are only ever removed by taking the entire Stack at once, so a pop
/// never has to read the `next` Ptr of a Node that another Thread might have
/// taken and pushed again in the mean time.
pub struct Stack<T> {
    top: atomic::AtomicPtr<Node<T>>,
}

impl<T> Debug for Stack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node-Stack<{}> ()", std::any::type_name::<T>())
    }
}

impl<T> Stack<T> {
    /// Creates a new empty Stack
    pub fn new() -> Self {
        Self {
            top: atomic::AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Pushes a single Node onto the Stack
    ///
    /// # Safety
    /// The Caller must own the Node, it can not be linked into the Queue or
    /// be stored in the Stack already
    pub unsafe fn push(&self, node_ptr: *mut Node<T>) {
        let node = &*node_ptr;

        let mut top = self.top.load(atomic::Ordering::Relaxed);
        loop {
            node.next.store(top, atomic::Ordering::Relaxed);

            match self.top.compare_exchange_weak(
                top,
                node_ptr,
                atomic::Ordering::Release,
                atomic::Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => {
                    top = current;
                }
            };
        }
    }

    /// Takes all the Nodes currently stored in the Stack and returns the
    /// first Node of the Chain, or a Null-Ptr if the Stack was empty
    pub fn take_all(&self) -> *mut Node<T> {
        self.top
            .swap(std::ptr::null_mut(), atomic::Ordering::Acquire)
    }

    /// Checks if the Stack is currently empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.top.load(atomic::Ordering::Relaxed).is_null()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        let mut current = self.take_all();
        while !current.is_null() {
            // # Safety:
            // All the Nodes in the Stack are owned by it and contain no Data
            let next = unsafe { (*current).next.load(atomic::Ordering::Relaxed) };
            unsafe { Node::free(current) };
            current = next;
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn chain_len<T>(mut current: *mut Node<T>) -> usize {
        let mut count = 0;
        while !current.is_null() {
            count += 1;
            current = unsafe { (*current).next.load(atomic::Ordering::Relaxed) };
        }
        count
    }

    #[test]
    fn take_all_empty() {
        let stack = Stack::<u64>::new();

        assert!(stack.is_empty());
        assert!(stack.take_all().is_null());
    }

    #[test]
    fn push_take_all() {
        let stack = Stack::<u64>::new();

        let first = Node::boxed_empty();
        let second = Node::boxed_empty();
        unsafe {
            stack.push(first);
            stack.push(second);
        }
        assert!(!stack.is_empty());

        let chain = stack.take_all();
        assert_eq!(second, chain);
        assert_eq!(2, chain_len(chain));
        assert!(stack.is_empty());

        // Return the Nodes so the Stack frees them
        unsafe {
            stack.push(first);
            stack.push(second);
        }
    }

    #[test]
    fn concurrent_push() {
        let stack = std::sync::Arc::new(Stack::<u64>::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c_stack = stack.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        unsafe { c_stack.push(Node::boxed_empty()) };
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let chain = stack.take_all();
        assert_eq!(400, chain_len(chain));

        let mut current = chain;
        while !current.is_null() {
            let next = unsafe { (*current).next.load(atomic::Ordering::Relaxed) };
            unsafe { stack.push(current) };
            current = next;
        }
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn concurrent_push_take() {
        loom::model(|| {
            let stack = Arc::new(Stack::<u64>::new());

            let s1 = stack.clone();
            let s2 = stack.clone();

            let handle1 = thread::spawn(move || {
                unsafe { s1.push(Node::boxed_empty()) };
            });

            let handle2 = thread::spawn(move || {
                let chain = s2.take_all();

                let mut taken = 0;
                let mut current = chain;
                while !current.is_null() {
                    taken += 1;
                    let next = unsafe { (*current).next.load(atomic::Ordering::Relaxed) };
                    unsafe { s2.push(current) };
                    current = next;
                }
                taken
            });

            unsafe { stack.push(Node::boxed_empty()) };

            handle1.join().unwrap();
            let taken = handle2.join().unwrap();
            assert!(taken <= 2);

            let chain = stack.take_all();
            let mut remaining = 0;
            let mut current = chain;
            while !current.is_null() {
                remaining += 1;
                let next = unsafe { (*current).next.load(atomic::Ordering::Relaxed) };
                unsafe { Node::free(current) };
                current = next;
            }
            assert_eq!(2, remaining);
        });
    }
}
