//! Switches the Atomics and Thread-Local Storage used by the Crate to ones
//! that work with `loom` when the Crate is build with `--cfg loom`

#[cfg(loom)]
pub(crate) use loom::sync::atomic;

#[cfg(not(loom))]
pub(crate) use std::sync::atomic;

#[cfg(not(loom))]
pub(crate) use thread_local::ThreadLocal;

#[cfg(loom)]
pub(crate) use loom_local::ThreadLocal;

/// `loom` runs all the Threads of a Model on a single OS-Thread, so the
/// Storage has to be keyed by the `loom` Thread-ID instead
#[cfg(loom)]
mod loom_local {
    use std::sync::Mutex;

    use loom::thread::ThreadId;

    pub(crate) struct ThreadLocal<T> {
        values: Mutex<Vec<(ThreadId, Box<T>)>>,
    }

    impl<T> ThreadLocal<T>
    where
        T: Send,
    {
        pub fn new() -> Self {
            Self {
                values: Mutex::new(Vec::new()),
            }
        }

        pub fn get(&self) -> Option<&T> {
            let id = loom::thread::current().id();
            let values = self.values.lock().ok()?;
            values
                .iter()
                .find(|(owner, _)| *owner == id)
                // # Safety:
                // The Boxes are only dropped together with the ThreadLocal
                // and never move while it lives
                .map(|(_, value)| unsafe { &*(&**value as *const T) })
        }

        pub fn get_or<F>(&self, create: F) -> &T
        where
            F: FnOnce() -> T,
        {
            if let Some(value) = self.get() {
                return value;
            }

            let id = loom::thread::current().id();
            let boxed = Box::new(create());
            let ptr = &*boxed as *const T;
            match self.values.lock() {
                Ok(mut values) => values.push((id, boxed)),
                Err(poisoned) => poisoned.into_inner().push((id, boxed)),
            };

            // # Safety:
            // See `get`
            unsafe { &*ptr }
        }

        pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
            let values = match self.values.get_mut() {
                Ok(values) => values,
                Err(poisoned) => poisoned.into_inner(),
            };
            values.iter_mut().map(|(_, value)| &mut **value)
        }
    }
}
