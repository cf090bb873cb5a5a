//! Self-describing message values.
//!
//! A [`Value`] is a closed sum type with one recursive case, [`Value::Map`],
//! whose entries are further values. Messages are trees: nothing here
//! detects cycles, and callers must not build them.

mod error;
mod extension;
mod key;
mod message;
mod unsafe_ref;
mod variant;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub use error::{CopyError, ValueError};
pub use extension::{Extension, NoExtension};
pub use key::Key;
pub use message::{Message, Nested};
pub use unsafe_ref::UnsafeRef;
pub use variant::Variant;

/// Unordered association from scalar keys to values.
pub type Map<E = NoExtension> = HashMap<Key, Value<E>>;

/// One node of a message tree.
///
/// `Int` and `Num` are distinct variants: `Int(5)` never reads back as
/// `5.0` and vice versa.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<E = NoExtension> {
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    /// Owned host-defined payload.
    Ext(E),
    /// Payload still owned by the guest; replaced by `Ext` on push.
    Unsafe(UnsafeRef<E>),
    Map(Map<E>),
}

impl<E: Extension> Value<E> {
    /// Wrap an owned extension payload.
    pub fn ext(payload: impl Into<E>) -> Self {
        Value::Ext(payload.into())
    }

    /// Tag guest-controlled storage for copy-on-push.
    pub fn lend<T>(storage: &Arc<RwLock<T>>) -> Self
    where
        T: Clone + Into<E> + Send + Sync + 'static,
    {
        Value::Unsafe(UnsafeRef::lend(storage))
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Value::Map(Map::new())
    }

    /// Name of the active variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Num(_) => "Num",
            Value::Str(_) => "Str",
            Value::Ext(payload) => payload.type_name(),
            Value::Unsafe(_) => "UnsafeRef",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// True when no node of this tree is still a lent reference.
    pub fn is_owned(&self) -> bool {
        match self {
            Value::Unsafe(_) => false,
            Value::Map(map) => map.values().all(Value::is_owned),
            _ => true,
        }
    }

    /// Borrow the payload if the active variant is `T`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for any other variant. No numeric coercion happens.
    pub fn cast<T: Variant<E>>(&self) -> Result<&T, ValueError> {
        T::from_value(self).ok_or(ValueError::TypeMismatch {
            expected: T::NAME,
            found: self.type_name(),
        })
    }

    /// Look up a child of a map node.
    ///
    /// # Errors
    ///
    /// `NotAMap` if this node is not a map, `KeyNotFound` if the key is absent.
    pub fn get(&self, key: impl Into<Key>) -> Result<&Value<E>, ValueError> {
        let key = key.into();
        match self {
            Value::Map(map) => map.get(&key).ok_or(ValueError::KeyNotFound { key }),
            other => Err(ValueError::NotAMap {
                key,
                found: other.type_name(),
            }),
        }
    }
}

impl<E> From<bool> for Value<E> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<E> From<i64> for Value<E> {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl<E> From<i32> for Value<E> {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl<E> From<f64> for Value<E> {
    fn from(value: f64) -> Self {
        Value::Num(value)
    }
}

impl<E> From<&str> for Value<E> {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl<E> From<String> for Value<E> {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl<E> From<Map<E>> for Value<E> {
    fn from(value: Map<E>) -> Self {
        Value::Map(value)
    }
}

impl<E> From<Message<E>> for Value<E> {
    fn from(message: Message<E>) -> Self {
        message.into_value()
    }
}

/// Build a [`Map`] from `key => value` pairs.
///
/// # Example
/// ```ignore
/// let msg: Map = map! {
///     "type" => "MOCK MESSAGE",
///     7 => map! { 3 => 5.8 },
/// };
/// ```
#[macro_export]
macro_rules! map {
    () => {
        $crate::value::Map::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::Map::new();
        $(
            map.insert(
                $crate::value::Key::from($key),
                $crate::value::Value::from($value),
            );
        )+
        map
    }};
}
