//! Performance monitoring: store-size samples, ingest latency, memory estimate.

use std::time::{Duration, Instant};

use surge_core::{MessageItem, PerformanceSample, RingBuffer};

/// Default number of store-size samples to keep (at 1s interval = 1 minute).
pub(crate) const DEFAULT_SAMPLE_HISTORY_SIZE: usize = 60;

/// Number of ingest durations averaged for `average_processing_time`.
pub(crate) const PROCESSING_TIME_HISTORY_SIZE: usize = 100;

/// Read-only observer of the store.
///
/// Throughput is the net growth of the store between the last two samples,
/// scaled by the time between them. It is not a gross arrival rate: evictions
/// inside one sampling interval offset arrivals and make the estimate
/// undercount.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    samples: RingBuffer<PerformanceSample>,
    processing_times: RingBuffer<Duration>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_HISTORY_SIZE)
    }
}

impl PerformanceMonitor {
    /// Create a monitor keeping `sample_history` store-size samples.
    pub fn new(sample_history: usize) -> Self {
        Self {
            samples: RingBuffer::new(sample_history),
            processing_times: RingBuffer::new(PROCESSING_TIME_HISTORY_SIZE),
        }
    }

    /// Record the store size at one tick.
    pub fn record_sample(&mut self, size: usize, now: Instant) {
        self.samples.push(PerformanceSample {
            size,
            taken_at: now,
        });
    }

    /// Record the wall-clock duration of one `ingest()` call.
    pub fn record_processing_time(&mut self, elapsed: Duration) {
        self.processing_times.push(elapsed);
    }

    /// Net growth per second between the two most recent samples, floored
    /// at zero.
    ///
    /// Samples taken at the same instant count as one second apart.
    pub fn messages_per_second(&self) -> u64 {
        let (Some(latest), Some(previous)) = (self.samples.latest(), self.samples.previous())
        else {
            return 0;
        };

        let growth = latest.size.saturating_sub(previous.size) as f64;
        let elapsed = latest
            .taken_at
            .saturating_duration_since(previous.taken_at)
            .as_secs_f64();
        if elapsed > 0.0 {
            (growth / elapsed).round() as u64
        } else {
            growth as u64
        }
    }

    /// Mean of the last recorded ingest durations.
    pub fn average_processing_time(&self) -> Duration {
        self.processing_times.mean()
    }

    /// Approximate memory held by `items`.
    pub fn memory_usage_estimate(items: &[MessageItem]) -> u64 {
        items.iter().map(MessageItem::estimated_size).sum()
    }

    pub fn samples(&self) -> &RingBuffer<PerformanceSample> {
        &self.samples
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.processing_times.clear();
    }
}
