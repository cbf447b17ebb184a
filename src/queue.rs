//! The lock-free Multi-Producer-Multi-Consumer Queue.
//!
//! The Queue is a singly Linked-List with a Sentinel at its Head, every
//! Producer links its Node at the current Tail using a CAS and every
//! Consumer advances the Head past the Sentinel using a CAS. Threads that
//! observe a Tail that is lagging behind help to advance it, which bounds
//! the Tail to at most one Node behind the actual End of the List.
//!
//! Removed Nodes are not freed, instead they are retired into a
//! Hazard-Pointer [`Domain`](crate::hazard_ptr::Domain) and once no other
//! Thread can still access them, they are placed in a Pool from which later
//! Enqueues take their Nodes.
//!
//! # Example
//! ```rust
//! # use msqueue::{Queue, DequeueError};
//! use std::sync::Arc;
//!
//! let queue = Arc::new(Queue::new());
//!
//! let producer = {
//!     let queue = queue.clone();
//!     std::thread::spawn(move || {
//!         for value in 0..10 {
//!             queue.enqueue(value);
//!         }
//!     })
//! };
//! producer.join().unwrap();
//!
//! for value in 0..10 {
//!     assert_eq!(Ok(value), queue.try_dequeue());
//! }
//! assert_eq!(Err(DequeueError::Empty), queue.try_dequeue());
//! ```
//!
//! # Reference
//! * [Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue Algorithms](https://www.cs.rochester.edu/u/scott/papers/1996_PODC_queues.pdf)

use std::{fmt::Debug, marker::PhantomData};

use crossbeam_utils::{Backoff, CachePadded};

use crate::{hazard_ptr::Domain, sync::atomic, trace::debug};

mod config;
pub use config::{Config, DEFAULT_RECLAIM_THRESHOLD};

mod node;
use node::Node;

mod pool;
use pool::Pool;

/// The Error returned by [`Queue::try_dequeue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    /// The Queue contained no Element at the Point of the Dequeue.
    ///
    /// This indicates that the Operation could succeed in the Future if you
    /// attempt to perform it again
    Empty,
}

impl std::fmt::Display for DequeueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "the queue is empty"),
        }
    }
}

impl std::error::Error for DequeueError {}

/// The Error returned by [`Queue::validate`], if the Linked-List of the
/// Queue is not well formed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Walking the List from the Head visited more Nodes than the Queue has
    /// ever allocated, so the List has to contain a Cycle
    Cycle,
    /// The Tail does not reference the last Node of the List
    TailNotLast,
    /// The Number of Elements in the List does not match the Length-Counter
    LengthMismatch {
        /// The Number of Elements found by walking the List
        counted: usize,
        /// The Value of the Length-Counter
        recorded: isize,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "the queue's list contains a cycle"),
            Self::TailNotLast => write!(f, "the tail does not point to the last node"),
            Self::LengthMismatch { counted, recorded } => write!(
                f,
                "the queue contains {} elements but the length counter is {}",
                counted, recorded
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A lock-free, unbounded Multi-Producer-Multi-Consumer FIFO Queue
///
/// To share the Queue between Threads, put it into an `Arc` or use scoped
/// Threads, all the Operations only need a shared Reference.
pub struct Queue<T> {
    /// The current Sentinel, the first Element is stored in its Successor
    head: CachePadded<atomic::AtomicPtr<Node<T>>>,
    /// The last Node of the List or the one right before it
    tail: CachePadded<atomic::AtomicPtr<Node<T>>>,
    /// The approximate Number of Elements, this may briefly be negative
    /// while an Enqueue has linked its Node but not yet counted it
    length: CachePadded<atomic::AtomicIsize>,
    pool: Pool<T>,
    domain: Domain<Node<T>>,
    _marker: PhantomData<*mut T>,
}

// # Safety:
// The Queue only moves the Data between Threads, it never gives out shared
// References to it, so it can be send to and shared between Threads as long
// as the Data itself can be send to other Threads
unsafe impl<T> Send for Queue<T> where T: Send {}
unsafe impl<T> Sync for Queue<T> where T: Send {}

impl<T> Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Queue<{}> ( len = {}, allocated_nodes = {} )",
            std::any::type_name::<T>(),
            self.len(),
            self.allocated_nodes()
        )
    }
}

/// Creates a new empty Queue
pub fn queue<T>() -> Queue<T> {
    Queue::new()
}

impl<T> Queue<T> {
    /// Creates a new empty Queue
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new empty Queue, which already has the Nodes for `nodes`
    /// Elements allocated
    ///
    /// # Example
    /// ```rust
    /// # use msqueue::Queue;
    /// let queue = Queue::with_capacity(16);
    /// let allocated = queue.allocated_nodes();
    ///
    /// for value in 0..16 {
    ///     queue.enqueue(value);
    /// }
    /// assert_eq!(allocated, queue.allocated_nodes());
    /// ```
    pub fn with_capacity(nodes: usize) -> Self {
        Self::with_config(Config::default().with_prealloc_nodes(nodes))
    }

    /// Creates a new empty Queue using the given Configuration
    pub fn with_config(config: Config) -> Self {
        let pool = Pool::new();

        let sentinel = pool.acquire();
        // # Safety:
        // The Node was just acquired from the Pool and is therefore exclusively
        // owned by us
        unsafe { &*sentinel }
            .next
            .store(std::ptr::null_mut(), atomic::Ordering::Relaxed);

        pool.reserve(config.prealloc_nodes);

        Self {
            head: CachePadded::new(atomic::AtomicPtr::new(sentinel)),
            tail: CachePadded::new(atomic::AtomicPtr::new(sentinel)),
            length: CachePadded::new(atomic::AtomicIsize::new(0)),
            pool,
            domain: Domain::new(config.reclaim_threshold),
            _marker: PhantomData,
        }
    }

    /// Appends the Data to the End of the Queue, this always succeeds.
    ///
    /// # Example
    /// ```rust
    /// # use msqueue::Queue;
    /// let queue = Queue::new();
    ///
    /// queue.enqueue(13);
    /// assert_eq!(1, queue.len());
    /// ```
    pub fn enqueue(&self, data: T) {
        let node_ptr = self.pool.acquire();
        // # Safety:
        // Nodes handed out by the Pool are exclusively owned by the Caller
        unsafe { (*node_ptr).prepare(data) };

        let backoff = Backoff::new();
        let mut tail_guard = self.domain.empty_guard();
        loop {
            let tail_ptr = tail_guard.protect(&self.tail);
            // # Safety:
            // The Tail is never Null and the Guard only returns the Ptr once it
            // was still the Tail after the Hazard was published, so the Node
            // can not be recycled while we use it
            let tail = unsafe { &*tail_ptr };
            let next_ptr = tail.next.load(atomic::Ordering::Acquire);

            if self.tail.load(atomic::Ordering::Acquire) != tail_ptr {
                continue;
            }

            if next_ptr.is_null() {
                if tail
                    .next
                    .compare_exchange(
                        std::ptr::null_mut(),
                        node_ptr,
                        atomic::Ordering::AcqRel,
                        atomic::Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    // Another Thread may already have moved the Tail forward
                    let _ = self.tail.compare_exchange(
                        tail_ptr,
                        node_ptr,
                        atomic::Ordering::AcqRel,
                        atomic::Ordering::Relaxed,
                    );
                    self.length.fetch_add(1, atomic::Ordering::AcqRel);
                    return;
                }
            } else {
                // Help the Enqueue that linked `next` but has not yet moved
                // the Tail
                let _ = self.tail.compare_exchange(
                    tail_ptr,
                    next_ptr,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
            }

            backoff.spin();
        }
    }

    /// Attempts to remove the first Element from the Queue
    ///
    /// # Example
    /// ```rust
    /// # use msqueue::{Queue, DequeueError};
    /// let queue = Queue::new();
    ///
    /// queue.enqueue(13);
    ///
    /// assert_eq!(Ok(13), queue.try_dequeue());
    /// assert_eq!(Err(DequeueError::Empty), queue.try_dequeue());
    /// ```
    pub fn try_dequeue(&self) -> Result<T, DequeueError> {
        let backoff = Backoff::new();
        let mut head_guard = self.domain.empty_guard();
        let mut next_guard = self.domain.empty_guard();
        loop {
            let head_ptr = head_guard.protect(&self.head);
            let tail_ptr = self.tail.load(atomic::Ordering::Acquire);
            // # Safety:
            // The Head is never Null and it was still the Head after the Hazard
            // was published
            let head = unsafe { &*head_ptr };
            let next_ptr = next_guard.protect(&head.next);

            // Once we know that `head` is still the Head, its Successor is
            // still linked as well and therefore also safely protected
            if self.head.load(atomic::Ordering::Acquire) != head_ptr {
                continue;
            }

            if head_ptr == tail_ptr {
                if next_ptr.is_null() {
                    return Err(DequeueError::Empty);
                }

                // The Tail is lagging behind an already linked Node
                let _ = self.tail.compare_exchange(
                    tail_ptr,
                    next_ptr,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                continue;
            }

            // # Safety:
            // `next` is protected and still linked, see above
            let next = match unsafe { next_guard.as_ref() } {
                Some(n) => n,
                None => continue,
            };

            // The Data has to be read before the CAS, because once the Head
            // moved past `head`, another Consumer could take the Data out of
            // `next` and retire it. Only the Thread that wins the CAS turns
            // this Copy into an owned Value
            //
            // # Safety:
            // `next` is protected and its Data was written before it was linked
            let data = unsafe { next.read_data() };

            if self
                .head
                .compare_exchange(
                    head_ptr,
                    next_ptr,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                )
                .is_ok()
            {
                self.length.fetch_sub(1, atomic::Ordering::AcqRel);

                // Our own Hazards would otherwise keep the old Sentinel from
                // being recycled
                drop(next_guard);
                drop(head_guard);

                // # Safety:
                // The old Sentinel is no longer reachable from the Queue and
                // only the Thread that won the CAS retires it. Its Data was
                // already moved out, when it became the Sentinel.
                unsafe {
                    self.domain
                        .retire(head_ptr, |ptr| self.pool.release(ptr));
                }

                // # Safety:
                // We won the CAS, so we are the only Thread that owns the Data
                return Ok(unsafe { data.assume_init() });
            }

            backoff.spin();
        }
    }

    /// Returns the approximate Number of Elements in the Queue.
    ///
    /// The Counter is updated separately from the Linked-List itself, so
    /// while other Threads are enqueueing or dequeueing, the returned Value
    /// may briefly be off. Once all Operations completed it is exact.
    pub fn len(&self) -> usize {
        let length = self.length.load(atomic::Ordering::Acquire);
        usize::try_from(length).unwrap_or(0)
    }

    /// Checks if the Queue currently contains no Elements.
    ///
    /// Unlike [`Queue::len`] this looks at the Linked-List itself.
    pub fn is_empty(&self) -> bool {
        let head_guard = self.domain.protect(&self.head);
        // # Safety:
        // The Head is never Null and protected by the Guard
        let head = unsafe { &*head_guard.raw() };
        head.next.load(atomic::Ordering::Acquire).is_null()
    }

    /// The total Number of Nodes the Queue has allocated so far, including
    /// the Sentinel and the Nodes that are currently in the Pool
    pub fn allocated_nodes(&self) -> usize {
        self.pool.allocated()
    }

    /// Walks the entire Linked-List and checks that it is well formed.
    ///
    /// This needs exclusive access to the Queue, so it can only be called
    /// while no other Operation is in progress, at which Point the
    /// Length-Counter is also exact.
    ///
    /// # Returns
    /// The exact Number of Elements in the Queue
    ///
    /// # Example
    /// ```rust
    /// # use msqueue::Queue;
    /// let mut queue = Queue::new();
    /// queue.enqueue(1);
    /// queue.enqueue(2);
    ///
    /// assert_eq!(Ok(2), queue.validate());
    /// ```
    pub fn validate(&mut self) -> Result<usize, ValidationError> {
        let limit = self.pool.allocated();

        let mut current = self.head.load(atomic::Ordering::Acquire);
        let mut visited = 1;
        loop {
            // # Safety:
            // We have exclusive access to the Queue, so every linked Node is
            // valid and not modified while we walk the List
            let next = unsafe { (*current).next.load(atomic::Ordering::Acquire) };
            if next.is_null() {
                break;
            }

            visited += 1;
            if visited > limit {
                return Err(ValidationError::Cycle);
            }
            current = next;
        }

        if self.tail.load(atomic::Ordering::Acquire) != current {
            return Err(ValidationError::TailNotLast);
        }

        let counted = visited - 1;
        let recorded = self.length.load(atomic::Ordering::Acquire);
        if usize::try_from(recorded).ok() != Some(counted) {
            return Err(ValidationError::LengthMismatch { counted, recorded });
        }

        Ok(counted)
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let sentinel = self.head.load(atomic::Ordering::Acquire);
        // # Safety:
        // We have exclusive access to the Queue and the Sentinel holds no Data
        let mut current = unsafe { (*sentinel).next.load(atomic::Ordering::Acquire) };
        unsafe { Node::free(sentinel) };

        while !current.is_null() {
            // # Safety:
            // Every Node after the Sentinel still holds its Data, which is
            // dropped exactly once here before the Node is freed
            let next = unsafe { (*current).next.load(atomic::Ordering::Acquire) };
            unsafe {
                (*current).drop_data();
                Node::free(current);
            }
            current = next;
        }

        // # Safety:
        // Retired Nodes are no longer linked and hold no Data
        self.domain.drain(|ptr| unsafe { Node::free(ptr) });

        debug!(allocated = self.pool.allocated(), "dropping Queue");
    }
}
