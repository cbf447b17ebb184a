//! Feature-gated logging for the Queue internals.
//!
//! Enable with `--features tracing`. Without the feature all the macros in
//! here expand to nothing, so the lock-free paths carry no extra cost.

/// Installs a tracing subscriber that writes the crate's events to stdout.
///
/// The filter is taken from `RUST_LOG` and falls back to `msqueue=trace`.
/// Does nothing if the `tracing` feature is not enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("msqueue=trace"));

    // A subscriber may already be installed by another test in the same
    // binary, which is fine
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

/// Installs a tracing subscriber that writes the crate's events to stdout.
///
/// Does nothing if the `tracing` feature is not enabled.
#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;

#[cfg(all(test, not(loom)))]
mod tests {
    use crate::{Config, DequeueError, Queue};

    #[test]
    fn init_then_log_queue_events() {
        super::init_tracing();
        // Installing a second time is ignored
        super::init_tracing();

        // Allocations, Scans and the Teardown all emit Events
        let queue = Queue::with_config(Config::default().with_reclaim_threshold(1));
        queue.enqueue(1);
        queue.enqueue(2);
        assert_eq!(Ok(1), queue.try_dequeue());
        assert_eq!(Ok(2), queue.try_dequeue());
        assert_eq!(Err(DequeueError::Empty), queue.try_dequeue());
        drop(queue);
    }
}
