//! Explicit subscriber registry for buffer mutations.
//!
//! Callbacks run synchronously, in subscription order, right after the
//! mutation that produced the event.

use serde::Serialize;

use crate::config::PerformanceMode;

/// Handle returned by [`SubscriberRegistry::subscribe`]
pub type SubscriptionId = u64;

/// A completed store or configuration mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BufferEvent {
    /// Items reached the store. `size` is the store size afterwards,
    /// including any prune the insert triggered.
    Inserted { count: usize, size: usize },
    /// A prune pass evicted `dropped` items.
    Pruned { dropped: usize, size: usize },
    /// The store was emptied.
    Cleared,
    /// Configuration changed through `update_config()`.
    ConfigChanged { mode: PerformanceMode },
    /// The mode controller switched profiles.
    ModeChanged {
        from: PerformanceMode,
        to: PerformanceMode,
    },
}

type Callback = Box<dyn Fn(&BufferEvent) + Send>;

/// Ordered list of subscriber callbacks
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Callback)>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&BufferEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn notify(&self, event: &BufferEvent) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
