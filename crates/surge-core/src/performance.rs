//! # Performance Domain Types
//!
//! Load samples, the aggregated [`Metrics`] snapshot exposed to callers, and
//! a generic ring buffer for rolling history.
//!
//! These types are the shared vocabulary between the store/batcher (which
//! own the counters) and the monitor (which owns the rolling windows).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

// ── PerformanceSample ────────────────────────────────────────────────────────

/// Store size observed at one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSample {
    /// Number of items in the store at sampling time.
    pub size: usize,
    pub taken_at: Instant,
}

// ── Metrics ──────────────────────────────────────────────────────────────────

/// Point-in-time metrics for the buffer.
///
/// `dropped_messages`, `pruning_events` and `batches_processed` only grow
/// until an explicit reset. The other fields are recomputed on each read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Net store growth between the last two samples (never negative).
    pub messages_per_second: u64,
    /// Mean wall-clock duration of recent `ingest()` calls, in milliseconds.
    pub average_processing_time_ms: f64,
    pub memory_usage_estimate_bytes: u64,
    pub dropped_messages: u64,
    pub batches_processed: u64,
    pub pruning_events: u64,
}

impl Metrics {
    /// Format bytes as human-readable string (e.g., "12.5 MB").
    pub fn format_bytes(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * 1024;
        const GB: u64 = 1024 * 1024 * 1024;
        match bytes {
            b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
            b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
            b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
            b => format!("{} B", b),
        }
    }

    /// Whether any data has been lost to eviction.
    pub fn has_data_loss(&self) -> bool {
        self.dropped_messages > 0
    }
}

// ── RingBuffer<T> ────────────────────────────────────────────────────────────

/// A fixed-capacity FIFO window that discards the oldest entry when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a ring buffer holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one so `push` always retains the latest value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, returning the evicted oldest entry if at capacity.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.buf.len() == self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed entry.
    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Entry pushed just before the latest one.
    pub fn previous(&self) -> Option<&T> {
        let len = self.buf.len();
        if len < 2 {
            return None;
        }
        self.buf.get(len - 2)
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl RingBuffer<Duration> {
    /// Arithmetic mean of the stored durations, zero when empty.
    pub fn mean(&self) -> Duration {
        if self.buf.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.buf.iter().sum();
        total / self.buf.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_discards_oldest() {
        let mut rb = RingBuffer::new(3);
        assert_eq!(rb.push(1), None);
        assert_eq!(rb.push(2), None);
        assert_eq!(rb.push(3), None);
        assert_eq!(rb.push(4), Some(1));

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(rb.latest(), Some(&4));
        assert_eq!(rb.previous(), Some(&3));
    }

    #[test]
    fn test_ring_buffer_previous_needs_two() {
        let mut rb = RingBuffer::new(5);
        assert_eq!(rb.previous(), None);
        rb.push("a");
        assert_eq!(rb.previous(), None);
        assert_eq!(rb.latest(), Some(&"a"));
    }

    #[test]
    fn test_ring_buffer_zero_capacity() {
        let mut rb = RingBuffer::new(0);
        rb.push(1);
        rb.push(2);
        assert_eq!(rb.capacity(), 1);
        assert_eq!(rb.latest(), Some(&2));
    }

    #[test]
    fn test_duration_mean() {
        let mut rb = RingBuffer::new(4);
        assert_eq!(rb.mean(), Duration::ZERO);
        rb.push(Duration::from_millis(2));
        rb.push(Duration::from_millis(4));
        assert_eq!(rb.mean(), Duration::from_millis(3));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(Metrics::format_bytes(512), "512 B");
        assert_eq!(Metrics::format_bytes(2048), "2.0 KB");
        assert_eq!(Metrics::format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_metrics_data_loss() {
        let mut m = Metrics::default();
        assert!(!m.has_data_loss());
        m.dropped_messages = 1;
        assert!(m.has_data_loss());
    }
}
