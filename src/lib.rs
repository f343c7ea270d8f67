//! surge library
//!
//! Headless front end for the surge message buffer: reads or generates a
//! message stream, drives it through the buffer, and reports NDJSON events.

pub mod headless;

// Re-export main entry points
pub use headless::runner::{run_headless, InputSource, RunOptions};
