//! The message buffer: one batcher feeding one store, observed by the
//! monitor and steered by the mode controller.

use std::time::{Duration, Instant};

use surge_core::prelude::*;
use surge_core::{compute_view_window, MessageItem, Metrics, ViewWindow, ViewportGeometry};

use crate::config::{BufferConfig, ConfigUpdate, MonitorSettings, PerformanceMode};

use super::batcher::{BatchDecision, Batcher};
use super::mode::ModeController;
use super::monitor::PerformanceMonitor;
use super::observer::{BufferEvent, SubscriberRegistry, SubscriptionId};
use super::store::{InsertOutcome, MessageStore};

/// Bounded, batching, self-tuning message buffer.
///
/// All mutation happens through `&mut self`, so a single owner drives it
/// from one event loop. Methods ending in `_at` take the current instant
/// explicitly; the plain variants use `Instant::now()`.
#[derive(Debug)]
pub struct MessageBuffer {
    config: BufferConfig,
    store: MessageStore,
    batcher: Batcher,
    monitor: PerformanceMonitor,
    mode: ModeController,
    subscribers: SubscriberRegistry,
}

impl MessageBuffer {
    /// Create a buffer with default monitor settings.
    pub fn new(config: BufferConfig) -> Result<Self> {
        Self::with_monitor(config, &MonitorSettings::default())
    }

    pub fn with_monitor(config: BufferConfig, monitor: &MonitorSettings) -> Result<Self> {
        config.validate()?;

        let mut mode = ModeController::new(config.performance_mode, monitor.mode_stability_samples);
        mode.set_enabled(monitor.auto_mode);

        Ok(Self {
            store: MessageStore::new(&config),
            batcher: Batcher::new(&config),
            monitor: PerformanceMonitor::new(monitor.history_size),
            mode,
            subscribers: SubscriberRegistry::new(),
            config,
        })
    }

    // ─────────────────────────────────────────────────────────
    // Ingest & Flush
    // ─────────────────────────────────────────────────────────

    pub fn ingest(&mut self, items: Vec<MessageItem>) -> Result<()> {
        self.ingest_at(items, Instant::now())
    }

    /// Submit items from a producer.
    ///
    /// Every item is validated before anything is queued or stored; one
    /// malformed item rejects the whole call and leaves the buffer as it
    /// was. An empty submission is a no-op.
    pub fn ingest_at(&mut self, items: Vec<MessageItem>, now: Instant) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        for (index, item) in items.iter().enumerate() {
            if let Err(e) = item.validate() {
                warn!("Rejected ingest of {} messages: item {}: {}", items.len(), index, e);
                return Err(e);
            }
        }

        let started = Instant::now();

        match self.batcher.ingest(items, now) {
            BatchDecision::Ignored => {}
            BatchDecision::Immediate(items) => self.insert(items, now)?,
            BatchDecision::FlushNow => {
                self.flush_at(now)?;
            }
            BatchDecision::Deferred { deadline } => {
                trace!(
                    "Queued ingest, {} pending, flush in {:?}",
                    self.batcher.pending_count(),
                    deadline.saturating_duration_since(now)
                );
            }
        }

        self.monitor.record_processing_time(started.elapsed());
        Ok(())
    }

    pub fn flush(&mut self) -> Result<usize> {
        self.flush_at(Instant::now())
    }

    /// Insert everything pending as one batch. Returns the item count.
    pub fn flush_at(&mut self, now: Instant) -> Result<usize> {
        let Some(batch) = self.batcher.flush() else {
            return Ok(0);
        };
        let count = batch.len();
        debug!("Flushing batch {} with {} messages", batch.batch_id, count);
        self.insert(batch.items, now)?;
        Ok(count)
    }

    /// Fire the deferred flush if its deadline has passed.
    ///
    /// Returns true when a flush ran.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        if !self.batcher.is_due(now) {
            return Ok(false);
        }
        self.flush_at(now)?;
        Ok(true)
    }

    /// Time until the deferred flush is due, if one is scheduled.
    pub fn time_until_flush(&self, now: Instant) -> Option<Duration> {
        self.batcher.time_until_flush(now)
    }

    pub fn flush_deadline(&self) -> Option<Instant> {
        self.batcher.flush_deadline()
    }

    pub fn pending_count(&self) -> usize {
        self.batcher.pending_count()
    }

    fn insert(&mut self, items: Vec<MessageItem>, now: Instant) -> Result<()> {
        let InsertOutcome { inserted, pruned } = self.store.insert(items, now)?;
        let size = self.store.len();

        self.subscribers
            .notify(&BufferEvent::Inserted { count: inserted, size });
        if let Some(outcome) = pruned {
            self.subscribers.notify(&BufferEvent::Pruned {
                dropped: outcome.dropped,
                size,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Monitoring & Mode Control
    // ─────────────────────────────────────────────────────────

    /// One monitor tick: sample the store size, then let the mode
    /// controller react. Returns the new mode if it switched.
    pub fn sample(&mut self, now: Instant) -> Result<Option<PerformanceMode>> {
        self.monitor.record_sample(self.store.len(), now);
        let rate = self.monitor.messages_per_second();

        let Some(target) = self.mode.evaluate(rate) else {
            return Ok(None);
        };

        let from = self.config.performance_mode;
        info!("Switching performance mode {} -> {} at {} msg/s", from, target, rate);
        self.update_config_at(ConfigUpdate::mode(target), now)?;
        self.subscribers
            .notify(&BufferEvent::ModeChanged { from, to: target });
        Ok(Some(target))
    }

    pub fn get_metrics(&self) -> Metrics {
        Metrics {
            messages_per_second: self.monitor.messages_per_second(),
            average_processing_time_ms: self.monitor.average_processing_time().as_secs_f64()
                * 1000.0,
            memory_usage_estimate_bytes: PerformanceMonitor::memory_usage_estimate(
                self.store.as_slice(),
            ),
            dropped_messages: self.store.dropped_messages(),
            batches_processed: self.batcher.batches_processed(),
            pruning_events: self.store.pruning_events(),
        }
    }

    pub fn reset_metrics(&mut self) {
        self.store.reset_metrics();
        self.batcher.reset_metrics();
        self.monitor.reset();
    }

    pub fn mode(&self) -> PerformanceMode {
        self.mode.current()
    }

    // ─────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<()> {
        self.update_config_at(update, Instant::now())
    }

    /// Apply a partial configuration update atomically.
    ///
    /// An update that leaves the configuration unchanged does nothing. If
    /// the store is above the new `max_messages` with evictable items, a
    /// prune runs immediately.
    pub fn update_config_at(&mut self, update: ConfigUpdate, now: Instant) -> Result<()> {
        let next = update.apply_to(&self.config)?;
        if next == self.config {
            return Ok(());
        }

        debug!("Applying configuration {:?}", next);
        self.config = next;
        self.store.apply_config(&self.config);

        if update.performance_mode.is_some() {
            self.mode.force(self.config.performance_mode);
        }

        if self.batcher.apply_config(&self.config) {
            self.flush_at(now)?;
        }

        let evictable_overflow =
            self.store.len() > self.config.max_messages.max(self.store.protected_count());
        if self.config.enable_pruning && evictable_overflow {
            let outcome = self.store.prune(now)?;
            self.subscribers.notify(&BufferEvent::Pruned {
                dropped: outcome.dropped,
                size: outcome.remaining,
            });
        }

        self.subscribers.notify(&BufferEvent::ConfigChanged {
            mode: self.config.performance_mode,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────

    /// Defensive copy of stored items, optionally filtered.
    pub fn get_all(&self, predicate: Option<&dyn Fn(&MessageItem) -> bool>) -> Vec<MessageItem> {
        self.store.get_all(predicate)
    }

    pub fn get_chunk(&self, start: usize, count: usize) -> Vec<MessageItem> {
        self.store.get_chunk(start, count)
    }

    /// Visible slice of the current contents for a renderer.
    pub fn view_window(&self, geometry: ViewportGeometry) -> ViewWindow<'_, MessageItem> {
        compute_view_window(self.store.as_slice(), geometry)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // ─────────────────────────────────────────────────────────
    // Subscribers & Teardown
    // ─────────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&BufferEvent) + Send + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Remove all stored items. Pending items and metrics are kept.
    pub fn clear(&mut self) {
        self.store.clear();
        self.subscribers.notify(&BufferEvent::Cleared);
    }

    /// Tear down: drop pending items and the scheduled flush, empty the
    /// store, and release subscribers. Safe to call more than once.
    pub fn destroy(&mut self) {
        let discarded = self.batcher.discard();
        if discarded > 0 {
            debug!("Discarded {} pending messages on destroy", discarded);
        }
        self.clear();
        self.subscribers.clear();
    }
}
