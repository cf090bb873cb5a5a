//! The shared message queue and its binding into guest runtimes.

mod binding;
mod message_queue;
mod runtime_id;

pub use binding::{BindingRegistry, GuestRuntime, QueueOp};
pub use message_queue::MessageQueue;
pub use runtime_id::RuntimeId;
