use crate::value::{Extension, Key, Map, NoExtension, Value, ValueError, Variant};

/// The unit carried by a queue: one value, usually a map.
#[derive(Clone, Debug, PartialEq)]
pub struct Message<E = NoExtension> {
    value: Value<E>,
}

impl<E> Message<E> {
    pub fn value(&self) -> &Value<E> {
        &self.value
    }

    pub fn into_value(self) -> Value<E> {
        self.value
    }
}

impl<E: Extension> Message<E> {
    pub fn new(value: impl Into<Value<E>>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Borrow the root payload as `T`.
    pub fn cast<T: Variant<E>>(&self) -> Result<&T, ValueError> {
        self.value.cast()
    }

    /// Step into a child of the root map.
    pub fn get(&self, key: impl Into<Key>) -> Result<Nested<'_, E>, ValueError> {
        self.root().get(key)
    }

    /// Cursor positioned at the root value.
    pub fn root(&self) -> Nested<'_, E> {
        Nested { node: &self.value }
    }
}

impl<E> From<Value<E>> for Message<E> {
    fn from(value: Value<E>) -> Self {
        Self { value }
    }
}

impl<E> From<Map<E>> for Message<E> {
    fn from(map: Map<E>) -> Self {
        Self {
            value: Value::Map(map),
        }
    }
}

impl<E> From<&str> for Message<E> {
    fn from(text: &str) -> Self {
        Self {
            value: Value::from(text),
        }
    }
}

impl<E> From<String> for Message<E> {
    fn from(text: String) -> Self {
        Self {
            value: Value::Str(text),
        }
    }
}

impl<E> From<bool> for Message<E> {
    fn from(flag: bool) -> Self {
        Self {
            value: Value::Bool(flag),
        }
    }
}

impl<E> From<f64> for Message<E> {
    fn from(number: f64) -> Self {
        Self {
            value: Value::Num(number),
        }
    }
}

impl<E> From<i64> for Message<E> {
    fn from(number: i64) -> Self {
        Self {
            value: Value::Int(number),
        }
    }
}

/// Read-only cursor into a message tree, for chained lookups like
/// `msg.get("nested")?.get("flag")?.cast::<bool>()`.
pub struct Nested<'a, E> {
    node: &'a Value<E>,
}

impl<E> Clone for Nested<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Nested<'_, E> {}

impl<'a, E: Extension> Nested<'a, E> {
    pub fn get(self, key: impl Into<Key>) -> Result<Nested<'a, E>, ValueError> {
        self.node.get(key).map(|node| Nested { node })
    }

    pub fn cast<T: Variant<E>>(self) -> Result<&'a T, ValueError> {
        self.node.cast()
    }

    pub fn value(self) -> &'a Value<E> {
        self.node
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for Nested<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Nested").field(self.node).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;

    fn mock_message() -> Message {
        Message::from(map! {
            "type" => "MOCK MESSAGE",
            "nested" => map! { "flag" => true },
            7 => map! { 3 => 5.8 },
        })
    }

    #[test]
    fn nested_lookup_by_string_and_integer_keys() {
        let msg = mock_message();

        assert_eq!(msg.get("type").unwrap().cast::<String>().unwrap(), "MOCK MESSAGE");
        assert!(*msg.get("nested").unwrap().get("flag").unwrap().cast::<bool>().unwrap());
        assert_eq!(*msg.get(7).unwrap().get(3).unwrap().cast::<f64>().unwrap(), 5.8);
    }

    #[test]
    fn integer_and_string_keys_do_not_alias() {
        let msg = mock_message();

        assert_eq!(
            msg.get("7").unwrap_err(),
            ValueError::KeyNotFound { key: Key::from("7") }
        );
    }

    #[test]
    fn lookup_errors_name_the_problem() {
        let msg = mock_message();

        let err = msg.get("type").unwrap().get("x").unwrap_err();
        assert_eq!(
            err,
            ValueError::NotAMap {
                key: Key::from("x"),
                found: "Str",
            }
        );
        assert_eq!(err.to_string(), "cannot look up key \"x\" in Str: not a map");

        let err = msg.get("nested").unwrap().cast::<f64>().unwrap_err();
        assert_eq!(err.to_string(), "expected Num, found Map");
    }

    #[test]
    fn scalar_root_messages() {
        let msg: Message = "MOCK MESSAGE".into();
        assert_eq!(msg.cast::<String>().unwrap(), "MOCK MESSAGE");
        assert!(msg.get("anything").is_err());

        let msg: Message = Message::new(12.5);
        assert_eq!(msg.root().value(), &Value::Num(12.5));
    }

    #[test]
    fn message_unwraps_into_its_root_value() {
        let msg: Message = mock_message();
        let root = Value::from(msg.clone());

        assert_eq!(&root, msg.value());
        assert!(root.is_map());
        assert_eq!(Message::from(root), msg);
    }
}
