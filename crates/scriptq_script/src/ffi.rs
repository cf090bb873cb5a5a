//! FFI layer between Rust and scripts
//!
//! Handle-based access to host objects. Script objects store a
//! [`ScriptHandle`] under a hidden property; the host resolves it through a
//! [`HandleTable`].

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Property holding the queue handle on a published queue object.
pub const QUEUE_HANDLE_KEY: &str = "__scriptq_queue";

/// Property holding the handle on a lent-reference object.
pub const LENT_HANDLE_KEY: &str = "__scriptq_lent";

/// Global holding the registered queue operations.
pub const OPS_GLOBAL: &str = "__scriptq_ops";

/// Opaque handle for script access
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScriptHandle(pub u32);

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-side objects addressed by [`ScriptHandle`].
pub struct HandleTable<T> {
    next: AtomicU32,
    entries: DashMap<ScriptHandle, T>,
}

impl<T: Clone> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, value: T) -> ScriptHandle {
        let handle = ScriptHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: ScriptHandle) -> Option<T> {
        self.entries.get(&handle).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, handle: ScriptHandle) -> Option<T> {
        self.entries.remove(&handle).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
