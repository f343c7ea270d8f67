//! Ingest batching: coalesces rapid arrivals into single store inserts.

use std::time::{Duration, Instant};

use surge_core::{Batch, MessageItem};

use crate::config::BufferConfig;

/// What the caller must do with an ingest after the batcher has seen it.
#[derive(Debug)]
pub enum BatchDecision {
    /// Nothing was submitted.
    Ignored,
    /// Batching is off, or a lone item arrived with nothing pending: insert
    /// these items right away.
    Immediate(Vec<MessageItem>),
    /// The pending queue reached `batch_size`; call [`Batcher::flush`] now.
    FlushNow,
    /// Items are queued; a flush is scheduled at `deadline`.
    Deferred { deadline: Instant },
}

/// Queues multi-item ingests and releases them as one combined batch.
///
/// A flush happens when the pending item count reaches `batch_size`, or
/// when the single deferred deadline (set by the first pending ingest,
/// never pushed back by later ones) passes. Every queued item leaves
/// through exactly one flush.
#[derive(Debug)]
pub struct Batcher {
    /// Pending batches in arrival order
    pending: Vec<Batch>,
    pending_items: usize,
    batch_size: usize,
    update_interval: Duration,
    enabled: bool,
    /// Deadline of the scheduled deferred flush, if any
    flush_deadline: Option<Instant>,
    batches_processed: u64,
}

impl Batcher {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            pending: Vec::new(),
            pending_items: 0,
            batch_size: config.batch_size,
            update_interval: config.update_interval(),
            enabled: config.enable_batching,
            flush_deadline: None,
            batches_processed: 0,
        }
    }

    /// Adopt batching settings from a validated configuration.
    ///
    /// An already scheduled deadline is kept. Returns true when pending
    /// items should be flushed immediately under the new settings.
    pub fn apply_config(&mut self, config: &BufferConfig) -> bool {
        self.batch_size = config.batch_size;
        self.update_interval = config.update_interval();
        self.enabled = config.enable_batching;

        self.has_pending() && (!self.enabled || self.pending_items >= self.batch_size)
    }

    /// Route one ingest.
    pub fn ingest(&mut self, items: Vec<MessageItem>, now: Instant) -> BatchDecision {
        if items.is_empty() {
            return BatchDecision::Ignored;
        }

        // A lone item only bypasses the queue when nothing is waiting,
        // otherwise it would overtake earlier arrivals.
        if !self.enabled || (items.len() <= 1 && self.pending.is_empty()) {
            return BatchDecision::Immediate(items);
        }

        self.pending_items += items.len();
        self.pending.push(Batch::new(items, now));

        if self.pending_items >= self.batch_size {
            return BatchDecision::FlushNow;
        }

        let deadline = *self
            .flush_deadline
            .get_or_insert_with(|| now + self.update_interval);
        BatchDecision::Deferred { deadline }
    }

    /// Combine all pending batches into one, in arrival order.
    ///
    /// Cancels the scheduled deadline. Returns `None` (and counts nothing)
    /// when the queue is empty, so a late timer after a size-triggered
    /// flush is harmless.
    pub fn flush(&mut self) -> Option<Batch> {
        self.cancel_scheduled();

        let first_arrival = self.pending.first()?.arrived_at;
        let mut items = Vec::with_capacity(self.pending_items);
        for batch in self.pending.drain(..) {
            items.extend(batch.items);
        }
        self.pending_items = 0;
        self.batches_processed += 1;

        Some(Batch::new(items, first_arrival))
    }

    /// Drop the scheduled deadline. Safe to call repeatedly.
    pub fn cancel_scheduled(&mut self) {
        self.flush_deadline = None;
    }

    /// Whether the deferred deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.flush_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Time until the scheduled flush (for event loop timing)
    pub fn time_until_flush(&self, now: Instant) -> Option<Duration> {
        self.flush_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn flush_deadline(&self) -> Option<Instant> {
        self.flush_deadline
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_items
    }

    pub fn batches_processed(&self) -> u64 {
        self.batches_processed
    }

    pub fn reset_metrics(&mut self) {
        self.batches_processed = 0;
    }

    /// Discard pending items and the deadline without inserting anything.
    pub fn discard(&mut self) -> usize {
        self.cancel_scheduled();
        self.pending.clear();
        std::mem::take(&mut self.pending_items)
    }
}
