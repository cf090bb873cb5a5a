// extension.rs - Host-defined payload types carried by `Value::Ext`
//
// The queue treats extension payloads as opaque. It only needs to clone
// them, move them across threads, and name them in error messages.

use std::fmt;

/// A host-defined payload type that may travel inside a [`Value`](crate::value::Value).
///
/// Usually implemented through [`define_extension!`](crate::define_extension),
/// which builds an enum over several payload types.
pub trait Extension: Clone + fmt::Debug + Send + Sync + 'static {
    /// Name of the active payload type, used in error messages.
    fn type_name(&self) -> &'static str;
}

/// Extension set with no members, for queues that carry only built-in variants.
#[derive(Clone, Debug, PartialEq)]
pub enum NoExtension {}

impl Extension for NoExtension {
    fn type_name(&self) -> &'static str {
        match *self {}
    }
}

/// Declare an extension enum over several payload types.
///
/// Each member gets `From<Payload>` for the enum and a
/// [`Variant`](crate::value::Variant) impl, so `cast::<Payload>()` works on
/// values and messages of that extension set.
///
/// # Example
/// ```ignore
/// #[derive(Clone, Debug)]
/// struct Sprite { id: u32 }
///
/// define_extension! {
///     pub enum GameExt {
///         Sprite(Sprite),
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_extension {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::value::Extension for $name {
            fn type_name(&self) -> &'static str {
                match self {
                    $($name::$variant(_) => stringify!($ty)),+
                }
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(payload: $ty) -> Self {
                    $name::$variant(payload)
                }
            }

            impl $crate::value::Variant<$name> for $ty {
                const NAME: &'static str = stringify!($ty);

                #[allow(unreachable_patterns)]
                fn from_value(value: &$crate::value::Value<$name>) -> Option<&Self> {
                    match value {
                        $crate::value::Value::Ext($name::$variant(payload)) => Some(payload),
                        _ => None,
                    }
                }
            }
        )+
    };
}
