//! Bounded message buffer: store, batcher, monitor, mode control

pub(crate) mod batcher;
pub(crate) mod message_buffer;
pub(crate) mod mode;
pub(crate) mod monitor;
pub(crate) mod observer;
pub(crate) mod store;

#[cfg(test)]
mod tests;

pub use batcher::{BatchDecision, Batcher};
pub use message_buffer::MessageBuffer;
pub use mode::{target_mode, ModeController};
pub use monitor::PerformanceMonitor;
pub use observer::{BufferEvent, SubscriberRegistry, SubscriptionId};
pub use store::{InsertOutcome, MessageStore, PruneOutcome};
