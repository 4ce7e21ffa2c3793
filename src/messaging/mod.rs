pub mod bridge;
pub mod journal;

pub use bridge::{handler_fn, MessageBridge, MessageHandler};
pub use journal::Journal;
