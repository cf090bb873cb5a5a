//! Scriptq Core
//!
//! Message passing between native threads and an embedded script runtime:
//! - Recursive, self-describing `Value` trees keyed by scalars
//! - Copy-on-push for payloads whose storage the guest controls
//! - A single mutex-guarded FIFO shared by both sides
//!
//! The guest embedding itself lives behind [`queue::GuestRuntime`]; see
//! `scriptq_script` for the QuickJS implementation.

pub mod queue;
pub mod safe_copy;
pub mod value;

pub use queue::{BindingRegistry, GuestRuntime, MessageQueue, QueueOp, RuntimeId};
pub use safe_copy::SafeCopy;
pub use value::{
    CopyError, Extension, Key, Map, Message, Nested, NoExtension, UnsafeRef, Value, ValueError,
    Variant,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
