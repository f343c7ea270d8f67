//! Message sources for headless runs: NDJSON input and synthetic bursts.

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use surge_core::prelude::*;
use surge_core::{MessageItem, Priority};

/// Upper bound (exclusive) of the roll used to pick a synthetic priority.
const PRIORITY_ROLL: u32 = 100;

/// One parsed input line.
#[derive(Debug)]
pub enum SourceLine {
    Item(MessageItem),
    /// A line that could not be turned into a message, with its 1-based
    /// line number.
    Malformed { line: usize, error: Error },
}

/// Reads NDJSON messages one line at a time. Blank lines are skipped.
pub struct LineSource<R> {
    reader: R,
    buf: String,
    line: usize,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line: 0,
        }
    }

    /// Next parsed line, or `None` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<SourceLine>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(Some(match MessageItem::from_json_line(trimmed) {
                Ok(item) => SourceLine::Item(item),
                Err(error) => SourceLine::Malformed {
                    line: self.line,
                    error,
                },
            }));
        }
    }
}

/// A synthetic burst of `count` messages with increasing timestamps and
/// randomly weighted priorities.
pub fn generate_burst<R: Rng>(count: usize, rng: &mut R) -> Vec<MessageItem> {
    let start = Utc::now();
    (0..count)
        .map(|n| {
            MessageItem::new(format!("gen-{}", n), start + ChronoDuration::milliseconds(n as i64))
                .with_priority(random_priority(rng))
                .with_field("seq", n as u64)
        })
        .collect()
}

/// Mostly low and medium traffic with a thin protected tail.
fn random_priority<R: Rng>(rng: &mut R) -> Priority {
    match rng.gen_range(0..PRIORITY_ROLL) {
        0..=1 => Priority::Critical,
        2..=9 => Priority::High,
        10..=49 => Priority::Medium,
        _ => Priority::Low,
    }
}
