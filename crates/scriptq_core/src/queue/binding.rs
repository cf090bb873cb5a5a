use crate::queue::{MessageQueue, RuntimeId};
use crate::value::Extension;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Operations a guest can invoke on an exposed queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueOp {
    Size,
    Push,
    Pop,
}

impl QueueOp {
    pub const ALL: [QueueOp; 3] = [QueueOp::Size, QueueOp::Push, QueueOp::Pop];

    /// Name under which the guest sees this operation.
    pub fn name(self) -> &'static str {
        match self {
            QueueOp::Size => "size",
            QueueOp::Push => "push",
            QueueOp::Pop => "pop",
        }
    }
}

/// A guest runtime that can host queue operations.
///
/// Registration installs the callable operations once per runtime.
/// Publishing gives one queue instance a name the guest can reach.
pub trait GuestRuntime<E: Extension> {
    type Error;

    fn runtime_id(&self) -> RuntimeId;

    /// Install `ops` into the runtime. Called at most once per runtime by
    /// [`BindingRegistry::bind`].
    fn register_queue_ops(&self, ops: &[QueueOp]) -> Result<(), Self::Error>;

    /// Make `queue` reachable from guest code under `name`.
    ///
    /// Must fail if `name` already refers to a different queue.
    fn publish_queue(&self, name: &str, queue: Arc<MessageQueue<E>>) -> Result<(), Self::Error>;

    /// Queue that guest code currently reaches under `name`, if any.
    fn published_queue(&self, name: &str) -> Result<Option<Arc<MessageQueue<E>>>, Self::Error>;
}

static GLOBAL_REGISTRY: Lazy<BindingRegistry> = Lazy::new(BindingRegistry::new);

/// Tracks which runtimes already carry the queue operations.
pub struct BindingRegistry {
    bound: Mutex<HashSet<RuntimeId>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            bound: Mutex::new(HashSet::new()),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static BindingRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register the queue operations with `guest` unless this registry has
    /// already done so. Returns `true` when registration happened.
    ///
    /// The lock is held across registration so two threads binding the
    /// same runtime cannot both register.
    pub fn bind<E, G>(&self, guest: &G) -> Result<bool, G::Error>
    where
        E: Extension,
        G: GuestRuntime<E> + ?Sized,
    {
        let id = guest.runtime_id();
        let mut bound = self.bound.lock().unwrap_or_else(PoisonError::into_inner);
        if bound.contains(&id) {
            return Ok(false);
        }

        guest.register_queue_ops(&QueueOp::ALL)?;
        bound.insert(id);
        debug!(runtime = %id, "registered queue operations");
        Ok(true)
    }

    pub fn is_bound(&self, id: RuntimeId) -> bool {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Number of runtimes bound through this registry.
    pub fn len(&self) -> usize {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
