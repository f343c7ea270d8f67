//! # Message Domain Types
//!
//! The unit of data flowing through the buffer ([`MessageItem`]), its
//! eviction tier ([`Priority`]), and the transient group handed from the
//! batcher to the store ([`Batch`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ── Priority ─────────────────────────────────────────────────────────────────

/// Eviction tier of a message.
///
/// `High` and `Critical` items are never evicted by pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Whether items of this tier are exempt from eviction.
    pub fn is_protected(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(Error::validation(format!("unknown priority '{}'", other))),
        }
    }
}

// ── MessageItem ──────────────────────────────────────────────────────────────

/// A single discrete item held by the buffer.
///
/// Items are never mutated once created; the store only ever moves, copies,
/// or drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    /// Caller-assigned identifier, expected unique at insertion time.
    pub id: String,
    /// Ordering key. Items are sorted by this value, never by arrival time.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    /// Caller-provided size hint used instead of the serialized estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_estimate_bytes: Option<u64>,
    /// Remaining fields, carried opaquely.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl MessageItem {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            priority: Priority::default(),
            size_estimate_bytes: None,
            payload: Map::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_size_estimate(mut self, bytes: u64) -> Self {
        self.size_estimate_bytes = Some(bytes);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Check the item is well-formed enough to be stored.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("message id must not be empty"));
        }
        Ok(())
    }

    /// Approximate memory cost of this item in bytes.
    ///
    /// Uses `size_estimate_bytes` when present, otherwise two bytes per
    /// character of the item's JSON form.
    pub fn estimated_size(&self) -> u64 {
        if let Some(bytes) = self.size_estimate_bytes {
            return bytes;
        }
        match serde_json::to_string(self) {
            Ok(json) => json.chars().count() as u64 * 2,
            Err(e) => {
                tracing::debug!("Could not serialize message {} for sizing: {}", self.id, e);
                0
            }
        }
    }

    /// Build an item from one decoded JSON object.
    ///
    /// `timestamp` may be an RFC 3339 string or integer milliseconds since
    /// the Unix epoch. Missing `id` or `timestamp` is a validation failure.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::validation("message must be a JSON object"));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Err(Error::validation("message id must be a string")),
            None => return Err(Error::validation("message is missing 'id'")),
        };

        let timestamp = match fields.remove("timestamp") {
            Some(raw) => parse_timestamp(&raw)?,
            None => {
                return Err(Error::validation(format!(
                    "message '{}' is missing 'timestamp'",
                    id
                )))
            }
        };

        let priority = match fields.remove("priority") {
            Some(Value::String(p)) => p.parse()?,
            Some(Value::Null) | None => Priority::default(),
            Some(_) => return Err(Error::validation("priority must be a string")),
        };

        let size_estimate_bytes = match fields.remove("size_estimate_bytes") {
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        };

        let item = Self {
            id,
            timestamp,
            priority,
            size_estimate_bytes,
            payload: fields,
        };
        item.validate()?;
        Ok(item)
    }

    /// Parse a single NDJSON line into an item.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_json(value)
    }
}

fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::validation(format!("invalid timestamp '{}': {}", s, e))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| Error::validation(format!("timestamp out of range: {}", n))),
        _ => Err(Error::validation("timestamp must be a string or integer")),
    }
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Unique identifier for a flushed batch
pub type BatchId = u64;

static BATCH_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique batch ID
pub fn next_batch_id() -> BatchId {
    BATCH_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A group of items submitted to the store together.
///
/// Transient: built by a flush (or a direct forward) and consumed by a
/// single store insert.
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: BatchId,
    /// Items in submission order.
    pub items: Vec<MessageItem>,
    pub arrived_at: Instant,
}

impl Batch {
    pub fn new(items: Vec<MessageItem>, arrived_at: Instant) -> Self {
        Self {
            batch_id: next_batch_id(),
            items,
            arrived_at,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
