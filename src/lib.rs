#![deny(missing_docs)]
#![warn(rust_2018_idioms, missing_debug_implementations)]
//! This crate provides a lock-free, unbounded Multi-Producer-Multi-Consumer
//! FIFO Queue, which recycles the Nodes of its Linked-List instead of
//! allocating a new one for every Element.
//!
//! # Example
//! ```rust
//! # use msqueue::{Queue, DequeueError};
//! let queue = Queue::new();
//!
//! queue.enqueue(1);
//! queue.enqueue(2);
//!
//! assert_eq!(Ok(1), queue.try_dequeue());
//! assert_eq!(Ok(2), queue.try_dequeue());
//! assert_eq!(Err(DequeueError::Empty), queue.try_dequeue());
//! ```
//!
//! # Feature-Flags
//! * `tracing`: Emits `tracing` Events for Node-Allocations, Hazard-Scans
//! and Queue-Teardown and provides [`init_tracing`] to print them

pub mod hazard_ptr;

mod queue;
pub use queue::{queue, Config, DequeueError, Queue, ValidationError, DEFAULT_RECLAIM_THRESHOLD};

mod sync;

mod trace;
pub use trace::init_tracing;
