//! Copy-on-push.
//!
//! Every node tagged [`Value::Unsafe`] is replaced by an owned copy of the
//! lent payload. Everything else is already owned and stays as it is, so
//! the copy is only as deep as the lent references inside the tree.

use crate::value::{CopyError, Extension, Message, Value};

/// Produce a tree with no lent references left in it.
pub trait SafeCopy: Sized {
    /// # Errors
    ///
    /// Fails with the first [`CopyError`] met; the partially copied tree is
    /// dropped.
    fn safe_copy(self) -> Result<Self, CopyError>;
}

impl<E: Extension> SafeCopy for Value<E> {
    fn safe_copy(mut self) -> Result<Self, CopyError> {
        resolve_in_place(&mut self)?;
        Ok(self)
    }
}

impl<E: Extension> SafeCopy for Message<E> {
    fn safe_copy(self) -> Result<Self, CopyError> {
        self.into_value().safe_copy().map(Message::from)
    }
}

fn resolve_in_place<E: Extension>(node: &mut Value<E>) -> Result<(), CopyError> {
    match node {
        Value::Unsafe(lent) => {
            let owned = lent.copy_out()?;
            *node = Value::Ext(owned);
        }
        Value::Map(map) => {
            for child in map.values_mut() {
                resolve_in_place(child)?;
            }
        }
        _ => {}
    }
    Ok(())
}
