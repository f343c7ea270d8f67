//! Bounded message store with priority-aware eviction.

use std::time::{Duration, Instant};

use surge_core::prelude::*;
use surge_core::MessageItem;

use crate::config::{BufferConfig, OrderingPolicy};

/// Minimum time between two soft-limit prunes.
///
/// Exceeding `prune_threshold` ignores this cooldown.
pub(crate) const PRUNE_COOLDOWN: Duration = Duration::from_millis(5000);

/// Result of one prune pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneOutcome {
    pub dropped: usize,
    pub remaining: usize,
}

/// Result of one insert, including the prune it may have triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub pruned: Option<PruneOutcome>,
}

/// Ordered, bounded container of messages.
///
/// Owns item membership; everything else only sees copies or borrowed
/// snapshots. `High`/`Critical` items are never evicted, so the store can
/// stay above `max_messages` when protected volume alone exceeds it.
#[derive(Debug)]
pub struct MessageStore {
    items: Vec<MessageItem>,
    max_messages: usize,
    prune_threshold: usize,
    enable_pruning: bool,
    ordering: OrderingPolicy,
    last_prune: Option<Instant>,
    dropped_messages: u64,
    pruning_events: u64,
}

impl MessageStore {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            items: Vec::with_capacity(config.max_messages.min(4096)),
            max_messages: config.max_messages,
            prune_threshold: config.prune_threshold,
            enable_pruning: config.enable_pruning,
            ordering: config.ordering,
            last_prune: None,
            dropped_messages: 0,
            pruning_events: 0,
        }
    }

    /// Adopt capacity settings from a validated configuration.
    ///
    /// Switching to `Chronological` re-sorts the contents oldest first so
    /// later merges can rely on it.
    pub fn apply_config(&mut self, config: &BufferConfig) {
        self.max_messages = config.max_messages;
        self.prune_threshold = config.prune_threshold;
        self.enable_pruning = config.enable_pruning;

        if config.ordering != self.ordering && config.ordering == OrderingPolicy::Chronological {
            self.items.sort_by_key(|item| item.timestamp);
        }
        self.ordering = config.ordering;
    }

    /// Insert one batch, then prune if limits require it.
    ///
    /// The batch is sorted ascending by timestamp first. Where it lands
    /// depends on the ordering policy:
    /// - `Chronological`: merged so the whole store stays oldest first
    /// - `BatchRecency`: placed in front of all existing items
    pub fn insert(&mut self, mut batch: Vec<MessageItem>, now: Instant) -> Result<InsertOutcome> {
        let inserted = batch.len();
        if inserted == 0 {
            return Ok(InsertOutcome {
                inserted,
                pruned: None,
            });
        }

        batch.sort_by_key(|item| item.timestamp);

        match self.ordering {
            OrderingPolicy::Chronological => {
                let appends_cleanly = match (self.items.last(), batch.first()) {
                    (Some(last), Some(first)) => first.timestamp >= last.timestamp,
                    _ => true,
                };
                if appends_cleanly {
                    self.items.extend(batch);
                } else {
                    let existing = std::mem::take(&mut self.items);
                    self.items = merge_chronological(existing, batch);
                }
            }
            OrderingPolicy::BatchRecency => {
                batch.append(&mut self.items);
                self.items = batch;
            }
        }

        trace!("Inserted {} messages, store size {}", inserted, self.items.len());

        let pruned = if self.should_prune(now) {
            Some(self.prune(now)?)
        } else {
            None
        };

        Ok(InsertOutcome { inserted, pruned })
    }

    /// Whether a prune pass is due.
    ///
    /// True when above the hard ceiling, or above the soft cap with the
    /// cooldown elapsed since the last prune (or no prune yet).
    pub fn should_prune(&self, now: Instant) -> bool {
        if !self.enable_pruning {
            return false;
        }
        let len = self.items.len();
        if len > self.prune_threshold {
            return true;
        }
        len > self.max_messages
            && self
                .last_prune
                .map_or(true, |at| now.saturating_duration_since(at) >= PRUNE_COOLDOWN)
    }

    /// Evict normal-priority items down to `max_messages`.
    ///
    /// Protected items all survive. Normal items keep their relative order;
    /// which of them survive depends on the ordering policy:
    /// - `Chronological`: the newest `max_messages - protected` are kept,
    ///   result stays oldest first
    /// - `BatchRecency`: the first `max_messages - protected` in current
    ///   store order are kept, then everything is re-sorted newest first
    pub fn prune(&mut self, now: Instant) -> Result<PruneOutcome> {
        let original_len = self.items.len();

        let (protected, normal): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| item.priority.is_protected());

        let max_normal = self.max_messages.saturating_sub(protected.len());

        let surviving: Vec<MessageItem> = match self.ordering {
            OrderingPolicy::Chronological => {
                let skip = normal.len().saturating_sub(max_normal);
                normal.into_iter().skip(skip).collect()
            }
            OrderingPolicy::BatchRecency => normal.into_iter().take(max_normal).collect(),
        };

        self.items = match self.ordering {
            OrderingPolicy::Chronological => merge_chronological(protected, surviving),
            OrderingPolicy::BatchRecency => {
                let mut kept = protected;
                kept.extend(surviving);
                kept.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                kept
            }
        };

        let remaining = self.items.len();
        let dropped = original_len.checked_sub(remaining).ok_or_else(|| {
            Error::invariant(format!(
                "prune grew the store from {} to {}",
                original_len, remaining
            ))
        })?;

        self.dropped_messages += dropped as u64;
        self.pruning_events += 1;
        self.last_prune = Some(now);

        debug!(
            "Pruned {} messages ({} -> {}, max {})",
            dropped, original_len, remaining, self.max_messages
        );

        Ok(PruneOutcome { dropped, remaining })
    }

    /// Defensive copy of the contents in store order, optionally filtered.
    pub fn get_all(&self, predicate: Option<&dyn Fn(&MessageItem) -> bool>) -> Vec<MessageItem> {
        match predicate {
            Some(keep) => self.items.iter().filter(|item| keep(*item)).cloned().collect(),
            None => self.items.clone(),
        }
    }

    /// Copy of up to `count` items starting at `start`.
    pub fn get_chunk(&self, start: usize, count: usize) -> Vec<MessageItem> {
        let start = start.min(self.items.len());
        let end = start.saturating_add(count).min(self.items.len());
        self.items[start..end].to_vec()
    }

    /// Borrowed snapshot for read-only observers.
    pub fn as_slice(&self) -> &[MessageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn protected_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.priority.is_protected())
            .count()
    }

    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    pub fn pruning_events(&self) -> u64 {
        self.pruning_events
    }

    /// Remove all items. Counters are kept.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn reset_metrics(&mut self) {
        self.dropped_messages = 0;
        self.pruning_events = 0;
    }
}

/// Stable merge of two oldest-first sequences. On equal timestamps items
/// from `existing` come first.
fn merge_chronological(
    existing: Vec<MessageItem>,
    incoming: Vec<MessageItem>,
) -> Vec<MessageItem> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut existing = existing.into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();

    while let (Some(old), Some(new)) = (existing.peek(), incoming.peek()) {
        let take_incoming = new.timestamp < old.timestamp;
        let next = if take_incoming {
            incoming.next()
        } else {
            existing.next()
        };
        merged.extend(next);
    }
    merged.extend(existing);
    merged.extend(incoming);
    merged
}
