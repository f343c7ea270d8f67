//! Load-driven profile selection.
//!
//! Throughput thresholds pick a target [`PerformanceMode`] on every monitor
//! tick. A switch only happens once the same target has qualified for
//! `stability_samples` consecutive ticks, which keeps the mode from flapping
//! when load hovers at a threshold. With `stability_samples == 1` every
//! qualifying tick switches immediately.

use crate::config::PerformanceMode;

/// Above this many messages per second, use `UltraPerformance`.
pub const ULTRA_THRESHOLD: u64 = 100;

/// Above this many messages per second, use `HighFrequency`.
pub const HIGH_FREQUENCY_THRESHOLD: u64 = 50;

/// Below this many messages per second, return to `Normal`.
pub const NORMAL_THRESHOLD: u64 = 10;

/// Mode the thresholds ask for at `messages_per_second`, if any.
///
/// Between [`NORMAL_THRESHOLD`] and [`HIGH_FREQUENCY_THRESHOLD`] (inclusive)
/// there is no preference and the current mode is retained.
pub fn target_mode(messages_per_second: u64) -> Option<PerformanceMode> {
    if messages_per_second > ULTRA_THRESHOLD {
        Some(PerformanceMode::UltraPerformance)
    } else if messages_per_second > HIGH_FREQUENCY_THRESHOLD {
        Some(PerformanceMode::HighFrequency)
    } else if messages_per_second < NORMAL_THRESHOLD {
        Some(PerformanceMode::Normal)
    } else {
        None
    }
}

/// Tracks the active mode and the streak of ticks favouring a different one.
#[derive(Debug, Clone)]
pub struct ModeController {
    current: PerformanceMode,
    stability_samples: usize,
    enabled: bool,
    /// Candidate mode and how many consecutive ticks asked for it
    candidate: Option<(PerformanceMode, usize)>,
}

impl ModeController {
    pub fn new(current: PerformanceMode, stability_samples: usize) -> Self {
        Self {
            current,
            stability_samples: stability_samples.max(1),
            enabled: true,
            candidate: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.candidate = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current(&self) -> PerformanceMode {
        self.current
    }

    /// Record a mode chosen outside the controller (manual config update).
    pub fn force(&mut self, mode: PerformanceMode) {
        self.current = mode;
        self.candidate = None;
    }

    /// Evaluate one tick. Returns the new mode when a switch is due.
    ///
    /// The caller applies the returned mode; the controller already treats
    /// it as current.
    pub fn evaluate(&mut self, messages_per_second: u64) -> Option<PerformanceMode> {
        if !self.enabled {
            return None;
        }

        let target = match target_mode(messages_per_second) {
            Some(target) if target != self.current => target,
            _ => {
                self.candidate = None;
                return None;
            }
        };

        let streak = match self.candidate {
            Some((mode, count)) if mode == target => count + 1,
            _ => 1,
        };

        if streak >= self.stability_samples {
            self.current = target;
            self.candidate = None;
            Some(target)
        } else {
            self.candidate = Some((target, streak));
            None
        }
    }
}
