use crate::queue::{BindingRegistry, GuestRuntime};
use crate::safe_copy::SafeCopy;
use crate::value::{CopyError, Extension, Message, NoExtension, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// FIFO of owned message values, shared by native threads and guest code.
///
/// Every operation takes the same mutex, so `size`, `push` and `pop` are
/// linearizable with respect to each other. Lent payloads are copied before
/// the lock is taken; the queue never stores a reference it does not own.
pub struct MessageQueue<E = NoExtension> {
    items: Mutex<VecDeque<Value<E>>>,
    bound: AtomicBool,
}

impl<E: Extension> MessageQueue<E> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            bound: AtomicBool::new(false),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<Value<E>>> {
        // Deque operations never panic midway, so a poisoned lock still guards a whole deque.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of messages currently queued.
    pub fn size(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Append a message at the tail.
    ///
    /// Any lent payload inside `value` is copied first.
    ///
    /// # Errors
    ///
    /// Returns the [`CopyError`] of the first lent payload that could not be
    /// copied. The queue is left unchanged in that case.
    pub fn push(&self, value: impl Into<Value<E>>) -> Result<(), CopyError> {
        let value: Value<E> = value.into();
        let owned = value.safe_copy().inspect_err(|err| {
            warn!(%err, "rejected message push");
        })?;

        let mut items = self.items();
        items.push_back(owned);
        trace!(size = items.len(), "pushed message");
        Ok(())
    }

    /// Remove and return the head message, or `None` when empty.
    pub fn pop(&self) -> Option<Message<E>> {
        self.pop_value().map(Message::from)
    }

    pub fn pop_value(&self) -> Option<Value<E>> {
        let mut items = self.items();
        let value = items.pop_front();
        if value.is_some() {
            trace!(size = items.len(), "popped message");
        }
        value
    }

    /// Make sure `guest` carries the queue operations.
    ///
    /// Safe to call repeatedly; `registry` decides whether registration
    /// actually happens.
    pub fn bind<G>(&self, guest: &G, registry: &BindingRegistry) -> Result<(), G::Error>
    where
        G: GuestRuntime<E> + ?Sized,
    {
        registry.bind::<E, G>(guest)?;
        self.bound.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether this queue has been bound into at least one runtime.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Bind, then publish this queue to `guest` under `name`.
    ///
    /// Publishing the same queue under the same name twice is a no-op. A name
    /// already held by another queue is refused by the guest.
    pub fn expose<G>(
        self: &Arc<Self>,
        guest: &G,
        registry: &BindingRegistry,
        name: &str,
    ) -> Result<(), G::Error>
    where
        G: GuestRuntime<E> + ?Sized,
    {
        self.bind(guest, registry)?;
        if self.is_exposed(guest, name)? {
            return Ok(());
        }

        guest.publish_queue(name, Arc::clone(self))?;
        debug!(runtime = %guest.runtime_id(), name, "exposed message queue");
        Ok(())
    }

    /// Whether guest code reaches this very queue under `name`.
    pub fn is_exposed<G>(self: &Arc<Self>, guest: &G, name: &str) -> Result<bool, G::Error>
    where
        G: GuestRuntime<E> + ?Sized,
    {
        Ok(guest
            .published_queue(name)?
            .is_some_and(|current| Arc::ptr_eq(&current, self)))
    }
}

impl<E: Extension> Default for MessageQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
