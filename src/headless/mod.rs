//! Headless mode - NDJSON event output
//!
//! The `surge` binary feeds messages through a buffer and reports what
//! happened as structured JSON on stdout, one event per line. Diagnostics
//! go to the log file, never to stdout.
//!
//! # Example Output
//!
//! ```json
//! {"event":"ingest_rejected","line":3,"count":1,"error":"Invalid message: message is missing 'id'","timestamp":1704700001000}
//! {"event":"metrics","mode":"normal","size":950,"messages_per_second":0,"average_processing_time_ms":0.02,"memory_usage_estimate_bytes":183040,"dropped_messages":50,"batches_processed":95,"pruning_events":3,"timestamp":1704700002000}
//! {"event":"window","start":0,"end":10,"visible_start":0,"visible_end":5,"total_height_px":19000.0,"offset_y_px":0.0,"ids":["m51","m52"],"timestamp":1704700002000}
//! ```

pub mod runner;
pub mod source;

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use surge_app::{BufferEvent, PerformanceMode};
use surge_core::{MessageItem, Metrics, OwnedViewWindow};

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Input that never reached the buffer
    IngestRejected {
        /// 1-based input line, when the failure is tied to one line
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
        count: usize,
        error: String,
        timestamp: i64,
    },

    /// A buffer mutation, forwarded from a subscriber
    Buffer {
        change: BufferEvent,
        timestamp: i64,
    },

    /// Final buffer metrics
    Metrics {
        mode: PerformanceMode,
        size: usize,
        #[serde(flatten)]
        metrics: Metrics,
        timestamp: i64,
    },

    /// The rendered range for the requested scroll position
    Window {
        start: usize,
        end: usize,
        visible_start: usize,
        visible_end: usize,
        total_height_px: f64,
        offset_y_px: f64,
        ids: Vec<String>,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn ingest_rejected(line: Option<usize>, count: usize, error: impl ToString) -> Self {
        Self::IngestRejected {
            line,
            count,
            error: error.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn buffer(change: &BufferEvent) -> Self {
        Self::Buffer {
            change: change.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn metrics(mode: PerformanceMode, size: usize, metrics: Metrics) -> Self {
        Self::Metrics {
            mode,
            size,
            metrics,
            timestamp: Self::now(),
        }
    }

    pub fn window(window: &OwnedViewWindow<MessageItem>) -> Self {
        Self::Window {
            start: window.start,
            end: window.end,
            visible_start: window.visible_start,
            visible_end: window.visible_end,
            total_height_px: window.total_height_px,
            offset_y_px: window.offset_y_px,
            ids: window.items.iter().map(|m| m.id.clone()).collect(),
            timestamp: Self::now(),
        }
    }
}
