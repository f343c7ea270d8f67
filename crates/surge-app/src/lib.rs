//! surge-app - Buffer engine and orchestration for surge
//!
//! This crate implements the message buffer (batching, bounded storage with
//! priority-aware pruning, throughput monitoring, and adaptive performance
//! modes), configuration loading, and the tokio driver that owns a buffer
//! and serves it through [`runtime::BufferHandle`].

pub mod buffer;
pub mod config;
pub mod runtime;

// Re-export primary types
pub use buffer::{BufferEvent, MessageBuffer, SubscriptionId};
pub use config::{
    BufferConfig, ConfigUpdate, MonitorSettings, OrderingPolicy, PerformanceMode, Settings,
};
pub use runtime::{spawn, BufferHandle, BufferTask};
