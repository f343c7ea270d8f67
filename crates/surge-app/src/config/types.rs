//! Configuration types for the message buffer
//!
//! Defines:
//! - `PerformanceMode` / `Profile` - Named operating profiles
//! - `BufferConfig` - Active store/batcher configuration
//! - `ConfigUpdate` - Partial update applied through `update_config()`
//! - `Settings` - Everything loaded from `.surge/config.toml`

use serde::{Deserialize, Serialize};
use std::time::Duration;

use surge_core::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity and pacing values that make up one operating profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub max_messages: usize,
    pub prune_threshold: usize,
    pub batch_size: usize,
    pub update_interval_ms: u64,
}

pub const NORMAL_PROFILE: Profile = Profile {
    max_messages: 1000,
    prune_threshold: 1500,
    batch_size: 10,
    update_interval_ms: 100,
};

pub const HIGH_FREQUENCY_PROFILE: Profile = Profile {
    max_messages: 500,
    prune_threshold: 750,
    batch_size: 25,
    update_interval_ms: 50,
};

pub const ULTRA_PERFORMANCE_PROFILE: Profile = Profile {
    max_messages: 200,
    prune_threshold: 300,
    batch_size: 50,
    update_interval_ms: 25,
};

/// Named operating profile selected manually or by the mode controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    #[default]
    Normal,
    HighFrequency,
    UltraPerformance,
}

impl PerformanceMode {
    pub fn profile(&self) -> Profile {
        match self {
            PerformanceMode::Normal => NORMAL_PROFILE,
            PerformanceMode::HighFrequency => HIGH_FREQUENCY_PROFILE,
            PerformanceMode::UltraPerformance => ULTRA_PERFORMANCE_PROFILE,
        }
    }
}

impl std::fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformanceMode::Normal => write!(f, "normal"),
            PerformanceMode::HighFrequency => write!(f, "high_frequency"),
            PerformanceMode::UltraPerformance => write!(f, "ultra_performance"),
        }
    }
}

impl std::str::FromStr for PerformanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(PerformanceMode::Normal),
            "high_frequency" | "highfrequency" => Ok(PerformanceMode::HighFrequency),
            "ultra_performance" | "ultraperformance" | "ultra" => {
                Ok(PerformanceMode::UltraPerformance)
            }
            other => Err(Error::configuration(format!(
                "unknown performance mode '{}'",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

/// How the store orders its contents across batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Oldest first by timestamp at all times; pruning evicts the oldest
    /// normal items.
    #[default]
    Chronological,
    /// Newest batch at the head, each batch ascending internally; only a
    /// prune pass re-sorts everything newest first.
    BatchRecency,
}

// ─────────────────────────────────────────────────────────────────────────────
// BufferConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Active configuration of the store and batcher
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Soft capacity target
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Hard ceiling that forces a prune regardless of cooldown
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: usize,

    /// Pending item count that forces an immediate flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay before a deferred flush fires
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    #[serde(default = "default_true")]
    pub enable_pruning: bool,

    #[serde(default = "default_true")]
    pub enable_batching: bool,

    #[serde(default)]
    pub performance_mode: PerformanceMode,

    #[serde(default)]
    pub ordering: OrderingPolicy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::for_mode(PerformanceMode::Normal)
    }
}

fn default_max_messages() -> usize {
    NORMAL_PROFILE.max_messages
}

fn default_prune_threshold() -> usize {
    NORMAL_PROFILE.prune_threshold
}

fn default_batch_size() -> usize {
    NORMAL_PROFILE.batch_size
}

fn default_update_interval_ms() -> u64 {
    NORMAL_PROFILE.update_interval_ms
}

fn default_true() -> bool {
    true
}

impl BufferConfig {
    /// Configuration with the given profile's values and defaults elsewhere.
    pub fn for_mode(mode: PerformanceMode) -> Self {
        let profile = mode.profile();
        Self {
            max_messages: profile.max_messages,
            prune_threshold: profile.prune_threshold,
            batch_size: profile.batch_size,
            update_interval_ms: profile.update_interval_ms,
            enable_pruning: true,
            enable_batching: true,
            performance_mode: mode,
            ordering: OrderingPolicy::default(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Check every option is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::configuration("max_messages must be at least 1"));
        }
        if self.prune_threshold < self.max_messages {
            return Err(Error::configuration(format!(
                "prune_threshold ({}) must not be below max_messages ({})",
                self.prune_threshold, self.max_messages
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::configuration("batch_size must be at least 1"));
        }
        if self.update_interval_ms == 0 {
            return Err(Error::configuration("update_interval_ms must be at least 1"));
        }
        Ok(())
    }

    fn apply_profile(&mut self, profile: Profile) {
        self.max_messages = profile.max_messages;
        self.prune_threshold = profile.prune_threshold;
        self.batch_size = profile.batch_size;
        self.update_interval_ms = profile.update_interval_ms;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConfigUpdate
// ─────────────────────────────────────────────────────────────────────────────

/// Partial configuration update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune_threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_pruning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_batching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_mode: Option<PerformanceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<OrderingPolicy>,
}

impl ConfigUpdate {
    /// Update that switches to a named profile.
    pub fn mode(mode: PerformanceMode) -> Self {
        Self {
            performance_mode: Some(mode),
            ..Self::default()
        }
    }

    /// Build the configuration that results from applying this update.
    ///
    /// A `performance_mode` loads its profile values first; explicit fields
    /// in the same update override them. A `max_messages` above the current
    /// `prune_threshold`, with no threshold given, scales the threshold by the
    /// same factor. The merged result must validate as a whole, otherwise
    /// `current` is left untouched by the caller.
    pub fn apply_to(&self, current: &BufferConfig) -> Result<BufferConfig> {
        let mut next = current.clone();

        if let Some(mode) = self.performance_mode {
            next.performance_mode = mode;
            next.apply_profile(mode.profile());
        }
        if let Some(v) = self.max_messages {
            // Raising the cap alone carries the hard ceiling along at the
            // same ratio, so it never ends up below the cap.
            if self.prune_threshold.is_none() && next.prune_threshold < v {
                next.prune_threshold =
                    next.prune_threshold.saturating_mul(v) / next.max_messages.max(1);
                next.prune_threshold = next.prune_threshold.max(v);
            }
            next.max_messages = v;
        }
        if let Some(v) = self.prune_threshold {
            next.prune_threshold = v;
        }
        if let Some(v) = self.batch_size {
            next.batch_size = v;
        }
        if let Some(v) = self.update_interval_ms {
            next.update_interval_ms = v;
        }
        if let Some(v) = self.enable_pruning {
            next.enable_pruning = v;
        }
        if let Some(v) = self.enable_batching {
            next.enable_batching = v;
        }
        if let Some(v) = self.ordering {
            next.ordering = v;
        }

        next.validate()?;
        Ok(next)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Application settings (.surge/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub view: ViewSettings,
}

/// Performance monitor and mode controller settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSettings {
    /// Interval between store-size samples
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Number of samples kept for throughput estimation
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Let the mode controller switch profiles from observed load
    #[serde(default = "default_true")]
    pub auto_mode: bool,

    /// Consecutive qualifying samples required before a profile switch
    #[serde(default = "default_stability_samples")]
    pub mode_stability_samples: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            history_size: default_history_size(),
            auto_mode: true,
            mode_stability_samples: default_stability_samples(),
        }
    }
}

impl MonitorSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_history_size() -> usize {
    60
}

fn default_stability_samples() -> usize {
    3
}

/// Rendering geometry used by the CLI window output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewSettings {
    #[serde(default = "default_item_height_px")]
    pub item_height_px: f64,

    #[serde(default = "default_overscan")]
    pub overscan: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            item_height_px: default_item_height_px(),
            overscan: default_overscan(),
        }
    }
}

fn default_item_height_px() -> f64 {
    20.0
}

fn default_overscan() -> usize {
    5
}
