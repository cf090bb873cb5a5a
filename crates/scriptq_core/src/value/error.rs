use crate::value::Key;
use thiserror::Error;

/// Errors raised while reading a [`Value`](crate::value::Value) tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot look up key {key} in {found}: not a map")]
    NotAMap { key: Key, found: &'static str },

    #[error("key {key} not found")]
    KeyNotFound { key: Key },
}

/// Errors raised while copying a lent payload into queue-owned storage.
///
/// A push that fails with one of these leaves the queue untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    #[error("lent {type_name} was released before it could be copied")]
    Expired { type_name: &'static str },

    #[error("lent {type_name} is poisoned by a panicked writer")]
    Poisoned { type_name: &'static str },
}
