use crate::value::{Map, Value};

/// A payload type that can be read out of a [`Value`] without coercion.
///
/// Implemented for the built-in variants (`bool`, `i64`, `f64`, `String`,
/// [`Map`]) and, through [`define_extension!`](crate::define_extension), for
/// each member of an extension set.
pub trait Variant<E>: Sized {
    /// Variant name reported by type mismatches.
    const NAME: &'static str;

    /// Borrow the payload if `value` holds this variant.
    fn from_value(value: &Value<E>) -> Option<&Self>;
}

impl<E> Variant<E> for bool {
    const NAME: &'static str = "Bool";

    fn from_value(value: &Value<E>) -> Option<&Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl<E> Variant<E> for i64 {
    const NAME: &'static str = "Int";

    fn from_value(value: &Value<E>) -> Option<&Self> {
        match value {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl<E> Variant<E> for f64 {
    const NAME: &'static str = "Num";

    fn from_value(value: &Value<E>) -> Option<&Self> {
        match value {
            Value::Num(n) => Some(n),
            _ => None,
        }
    }
}

impl<E> Variant<E> for String {
    const NAME: &'static str = "Str";

    fn from_value(value: &Value<E>) -> Option<&Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl<E> Variant<E> for Map<E> {
    const NAME: &'static str = "Map";

    fn from_value(value: &Value<E>) -> Option<&Self> {
        match value {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}
