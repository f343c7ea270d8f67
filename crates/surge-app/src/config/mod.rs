//! Configuration for the message buffer
//!
//! Supports:
//! - `.surge/config.toml` - Buffer, monitor and view settings
//! - Runtime partial updates via [`ConfigUpdate`]

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings, save_settings, SURGE_DIR};
pub use types::*;
