//! Lent references to guest-controlled storage
//!
//! A value tagged `Value::Unsafe` does not own its payload: it points at
//! storage whose lifetime the guest runtime decides. The queue never keeps
//! such a value. Push replaces it with an owned copy of whatever the
//! storage holds at that moment (see [`crate::safe_copy`]).

use crate::value::{CopyError, Extension};
use std::fmt;
use std::sync::{Arc, RwLock};

type CopyFn<E> = dyn Fn() -> Result<E, CopyError> + Send + Sync;

/// Borrowed reference to a payload owned by the guest.
///
/// Only a weak reference is held, so lending never extends the lifetime of
/// the storage. Constructed exclusively through [`UnsafeRef::lend`].
pub struct UnsafeRef<E> {
    copy: Arc<CopyFn<E>>,
    type_name: &'static str,
    addr: usize,
}

impl<E: Extension> UnsafeRef<E> {
    /// Tag `storage` for copy-on-push.
    ///
    /// `T` is the concrete payload type; the copy is converted into the
    /// extension set `E` when the reference is resolved.
    pub fn lend<T>(storage: &Arc<RwLock<T>>) -> Self
    where
        T: Clone + Into<E> + Send + Sync + 'static,
    {
        let type_name = short_type_name::<T>();
        let weak = Arc::downgrade(storage);
        let copy = move || -> Result<E, CopyError> {
            let strong = weak.upgrade().ok_or(CopyError::Expired { type_name })?;
            let guard = strong
                .read()
                .map_err(|_| CopyError::Poisoned { type_name })?;
            Ok((*guard).clone().into())
        };

        Self {
            copy: Arc::new(copy),
            type_name,
            addr: Arc::as_ptr(storage) as usize,
        }
    }

    /// Deep-copy the current contents of the lent storage.
    ///
    /// Holds the storage's read lock only for the duration of the clone.
    pub fn copy_out(&self) -> Result<E, CopyError> {
        (self.copy)()
    }
}

impl<E> UnsafeRef<E> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Address of the lent storage, for identity checks only.
    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl<E> Clone for UnsafeRef<E> {
    fn clone(&self) -> Self {
        Self {
            copy: Arc::clone(&self.copy),
            type_name: self.type_name,
            addr: self.addr,
        }
    }
}

impl<E> PartialEq for UnsafeRef<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.copy, &other.copy)
    }
}

impl<E> fmt::Debug for UnsafeRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnsafeRef<{}>({:#x})", self.type_name, self.addr)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
