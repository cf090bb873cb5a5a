//! Value marshalling between JavaScript and message trees
//!
//! Script to host (push):
//! - `boolean` becomes `Bool`; integer-tagged numbers become `Int`, other
//!   numbers `Num`; strings become `Str`.
//! - Plain objects and arrays become `Map`. Array indices are 0-based
//!   `Key::Int`s; property names are `Key::Int` when they spell a canonical
//!   integer and `integer_keys` is on, otherwise `Key::Str`.
//! - `undefined`/`null` entries are skipped, as if the key were absent. At
//!   the top level they are rejected.
//! - Objects created by [`ScriptRuntime::lend`](crate::ScriptRuntime::lend)
//!   become `Value::Unsafe`, resolved to an owned copy by the queue.
//! - Functions, symbols and anything else are rejected.
//!
//! Host to script (pop): maps always become plain objects, extension payloads
//! go through [`IntoScript`]. A map holding both `Int(n)` and `Str("n")` is
//! rejected with a `TypeError`.

use crate::ffi::{HandleTable, ScriptHandle, LENT_HANDLE_KEY};
use crate::settings::ScriptSettings;
use rquickjs::{Array, Ctx, Exception, IntoJs, Object, Value as JsValue};
use scriptq_core::{Extension, Key, Map, NoExtension, UnsafeRef, Value};
use thiserror::Error;
use tracing::trace;

/// Errors raised when a script value cannot travel as a message.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot carry a value of type {type_name} in a message")]
    Unsupported { type_name: &'static str },

    #[error("table nesting exceeds the limit of {max_depth} (cyclic table?)")]
    TooDeep { max_depth: usize },

    #[error("lent reference {handle} is unknown or has been released")]
    UnknownLent { handle: ScriptHandle },

    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),
}

impl ConvertError {
    /// Turn this error into a pending script exception.
    ///
    /// Engine errors already carry their exception and are passed through;
    /// everything else is raised as a `TypeError`.
    pub fn throw(self, ctx: &Ctx<'_>) -> rquickjs::Error {
        match self {
            ConvertError::Engine(err) => err,
            other => Exception::throw_type(ctx, &other.to_string()),
        }
    }
}

/// An extension set whose payloads have a script-side representation.
pub trait IntoScript: Extension {
    fn into_script<'js>(self, ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>>;
}

impl IntoScript for NoExtension {
    fn into_script<'js>(self, _ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>> {
        match self {}
    }
}

/// Tracks nesting while walking a script value.
struct DepthTracker {
    max_depth: usize,
    current_depth: usize,
}

impl DepthTracker {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            current_depth: 0,
        }
    }

    fn enter(&mut self) -> Result<(), ConvertError> {
        self.current_depth += 1;
        if self.current_depth > self.max_depth {
            return Err(ConvertError::TooDeep {
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.current_depth = self.current_depth.saturating_sub(1);
    }
}

/// Convert a script value into a message tree.
pub fn from_js<E: Extension>(
    value: &JsValue<'_>,
    lent: &HandleTable<UnsafeRef<E>>,
    settings: &ScriptSettings,
) -> Result<Value<E>, ConvertError> {
    if value.is_undefined() || value.is_null() {
        return Err(ConvertError::Unsupported {
            type_name: value.type_name(),
        });
    }

    let mut reader = Reader {
        lent,
        settings,
        depth: DepthTracker::new(settings.max_depth),
    };
    reader.read(value)
}

struct Reader<'a, E> {
    lent: &'a HandleTable<UnsafeRef<E>>,
    settings: &'a ScriptSettings,
    depth: DepthTracker,
}

impl<E: Extension> Reader<'_, E> {
    /// `Ok(None)` for `undefined`/`null`.
    fn read_entry(&mut self, value: &JsValue<'_>) -> Result<Option<Value<E>>, ConvertError> {
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        self.read(value).map(Some)
    }

    fn read(&mut self, value: &JsValue<'_>) -> Result<Value<E>, ConvertError> {
        if let Some(flag) = value.as_bool() {
            return Ok(Value::Bool(flag));
        }
        if let Some(int) = value.as_int() {
            return Ok(Value::Int(i64::from(int)));
        }
        if let Some(number) = value.as_float() {
            return Ok(Value::Num(number));
        }
        if let Some(text) = value.as_string() {
            return Ok(Value::Str(text.to_string()?));
        }
        // Functions and arrays are objects too; check them first.
        if value.is_function() {
            return Err(ConvertError::Unsupported {
                type_name: value.type_name(),
            });
        }
        if let Some(array) = value.as_array() {
            return self.read_array(array);
        }
        if let Some(object) = value.as_object() {
            return self.read_object(object);
        }

        Err(ConvertError::Unsupported {
            type_name: value.type_name(),
        })
    }

    fn read_array(&mut self, array: &Array<'_>) -> Result<Value<E>, ConvertError> {
        self.depth.enter()?;
        let mut map = Map::with_capacity(array.len());
        for (index, item) in array.iter::<JsValue>().enumerate() {
            if let Some(entry) = self.read_entry(&item?)? {
                map.insert(Key::Int(index as i64), entry);
            }
        }
        self.depth.exit();
        Ok(Value::Map(map))
    }

    fn read_object(&mut self, object: &Object<'_>) -> Result<Value<E>, ConvertError> {
        if let Some(raw) = object.get::<_, Option<u32>>(LENT_HANDLE_KEY)? {
            let handle = ScriptHandle(raw);
            let lent = self
                .lent
                .get(handle)
                .ok_or(ConvertError::UnknownLent { handle })?;
            trace!(%handle, type_name = lent.type_name(), "read lent reference");
            return Ok(Value::Unsafe(lent));
        }

        self.depth.enter()?;
        let mut map = Map::new();
        for prop in object.props::<String, JsValue>() {
            let (name, item) = prop?;
            if let Some(entry) = self.read_entry(&item)? {
                map.insert(self.key(name), entry);
            }
        }
        self.depth.exit();
        Ok(Value::Map(map))
    }

    fn key(&self, name: String) -> Key {
        if self.settings.integer_keys {
            if let Some(int) = canonical_int(&name) {
                return Key::Int(int);
            }
        }
        Key::Str(name)
    }
}

/// Parse `name` as an integer only if printing the integer gives `name` back.
fn canonical_int(name: &str) -> Option<i64> {
    let int = name.parse::<i64>().ok()?;
    (int.to_string() == name).then_some(int)
}

/// Convert a message tree into a script value.
///
/// `Int` values outside the 32-bit range become doubles and may lose
/// precision beyond 2^53.
pub fn to_js<'js, E: IntoScript>(ctx: &Ctx<'js>, value: Value<E>) -> rquickjs::Result<JsValue<'js>> {
    match value {
        Value::Bool(flag) => flag.into_js(ctx),
        Value::Int(int) => int.into_js(ctx),
        Value::Num(number) => Ok(JsValue::new_float(ctx.clone(), number)),
        Value::Str(text) => text.into_js(ctx),
        Value::Ext(payload) => payload.into_script(ctx),
        Value::Unsafe(lent) => Err(Exception::throw_type(
            ctx,
            &format!("lent {} was never copied", lent.type_name()),
        )),
        Value::Map(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, child) in map {
                let name = match key {
                    Key::Int(int) => int.to_string(),
                    Key::Str(name) => name,
                };
                // Int(7) and Str("7") are distinct keys but one property name.
                if object.contains_key(name.as_str())? {
                    return Err(Exception::throw_type(
                        ctx,
                        &format!("keys {name} and \"{name}\" collide in a script object"),
                    ));
                }
                object.set(name, to_js(ctx, child)?)?;
            }
            Ok(JsValue::from_object(object))
        }
    }
}
