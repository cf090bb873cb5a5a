//! Scriptq Scripting
//!
//! Exposes scriptq message queues to JavaScript via QuickJS.
//!
//! ## Architecture
//!
//! - **Runtime:** one [`ScriptRuntime`] per QuickJS context, identified by a
//!   `RuntimeId` so queue operations are registered once per context.
//! - **Marshalling:** JS objects and arrays become `Value::Map` trees on push;
//!   maps become plain objects on pop.
//! - **Handles:** script objects carry integer handles into host tables, never
//!   raw pointers.

pub mod convert;
mod error;
pub mod ffi;
pub mod runtime;
pub mod settings;

pub use convert::{ConvertError, IntoScript};
pub use error::ScriptError;
pub use ffi::ScriptHandle;
pub use runtime::ScriptRuntime;
pub use settings::ScriptSettings;

pub use rquickjs;
