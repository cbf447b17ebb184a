/// The default Number of retired Nodes a Thread collects, before it scans
/// the Hazard-Pointers to recycle them
pub const DEFAULT_RECLAIM_THRESHOLD: usize = 32;

/// The Configuration used to construct a [`Queue`](super::Queue)
///
/// # Example
/// ```rust
/// # use msqueue::{Config, Queue};
/// let config = Config::default()
///     .with_prealloc_nodes(64)
///     .with_reclaim_threshold(16);
///
/// let queue = Queue::<u64>::with_config(config);
/// queue.enqueue(13);
/// assert_eq!(Ok(13), queue.try_dequeue());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The Number of Nodes that are allocated up front and placed into the
    /// Pool, so the first Enqueues do not need to allocate
    pub prealloc_nodes: usize,
    /// The Number of Nodes a Thread retires before it tries to recycle them,
    /// higher Values amortize the Cost of a Scan but keep more Nodes out of
    /// circulation. A Value of 0 is treated as 1.
    pub reclaim_threshold: usize,
}

impl Config {
    /// Sets the Number of preallocated Nodes
    pub const fn with_prealloc_nodes(mut self, nodes: usize) -> Self {
        self.prealloc_nodes = nodes;
        self
    }

    /// Sets the reclaim Threshold
    pub const fn with_reclaim_threshold(mut self, threshold: usize) -> Self {
        self.reclaim_threshold = threshold;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prealloc_nodes: 0,
            reclaim_threshold: DEFAULT_RECLAIM_THRESHOLD,
        }
    }
}
