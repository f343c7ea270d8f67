//! # surge-core - Core Domain Types
//!
//! Foundation crate for the surge message buffer. Provides the message data
//! model, error handling, metrics vocabulary, and the pure windowing function
//! used by renderers.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Messages (`message`)
//! - [`MessageItem`] - An immutable item with id, timestamp, priority and payload
//! - [`Priority`] - Eviction tier (Low, Medium, High, Critical)
//! - [`Batch`] - Items handed to the store in one insert
//!
//! ### Performance (`performance`)
//! - [`Metrics`] - Snapshot returned by `get_metrics()`
//! - [`PerformanceSample`] - Store size at one monitor tick
//! - [`RingBuffer`] - Bounded FIFO window for rolling history
//!
//! ### Windowing (`view_window`)
//! - [`compute_view_window()`] - Visible sub-range of an ordered snapshot
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Validation / configuration / invariant failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use surge_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod message;
pub mod performance;
pub mod prelude;
pub mod view_window;

pub use error::{Error, Result, ResultExt};
pub use message::{next_batch_id, Batch, BatchId, MessageItem, Priority};
pub use performance::{Metrics, PerformanceSample, RingBuffer};
pub use view_window::{compute_view_window, OwnedViewWindow, ViewWindow, ViewportGeometry};
