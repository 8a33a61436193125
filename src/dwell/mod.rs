//! Dwell controller
//!
//! Converts a sustained hover into a single selection. The state is a plain
//! value owned by the engine and advanced once per tick:
//!
//! ```text
//! cooldown? ──yes──> clear, progress 0
//!     │no
//! hover none? ─yes─> clear, progress 0
//!     │no
//! unlocked? ──yes──> lock hover, start = now
//!     │no
//! hover != lock ───> decay progress, release lock at 0
//!     │
//! hover == lock ───> progress = elapsed / dwell, fire at 1.0
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::hit::Target;

/// Dwell tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DwellConfig {
    /// Uninterrupted hold needed to select
    pub dwell_ms: u64,
    /// Quiet period after a selection
    pub cooldown_ms: u64,
    /// Progress lost per tick while gaze is on a different target
    pub decay_per_tick: f64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 2000,
            cooldown_ms: 1200,
            decay_per_tick: 0.02,
        }
    }
}

/// Per-tick dwell state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DwellState {
    /// Locked (sticky) candidate
    target: Option<Target>,
    /// When the lock was taken
    start_ms: u64,
    /// When the last selection fired
    last_fire_ms: Option<u64>,
    /// Feedback only, never a decision input
    progress: f64,
}

impl DwellState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<Target> {
        self.target
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn last_fire_ms(&self) -> Option<u64> {
        self.last_fire_ms
    }

    pub fn in_cooldown(&self, now_ms: u64, config: &DwellConfig) -> bool {
        self.last_fire_ms
            .is_some_and(|fired| now_ms.saturating_sub(fired) < config.cooldown_ms)
    }

    /// Drop the lock and progress
    ///
    /// The cooldown anchor survives, so a selection that changed the mode
    /// still blocks the next one.
    pub fn reset(self) -> Self {
        Self {
            last_fire_ms: self.last_fire_ms,
            ..Self::default()
        }
    }

    /// Advance one tick
    ///
    /// Returns the next state and the target selected on this tick, if any.
    pub fn tick(
        self,
        hover: Option<Target>,
        now_ms: u64,
        config: &DwellConfig,
    ) -> (Self, Option<Target>) {
        if self.in_cooldown(now_ms, config) {
            return (self.reset(), None);
        }

        let Some(hover) = hover else {
            return (self.reset(), None);
        };

        let Some(locked) = self.target else {
            trace!(target = %hover, "dwell lock acquired");
            let next = Self {
                target: Some(hover),
                start_ms: now_ms,
                progress: 0.0,
                ..self
            };
            return (next, None);
        };

        if locked != hover {
            // sticky target: jitter costs a little progress instead of all of it
            let progress = (self.progress - config.decay_per_tick).max(0.0);
            if progress <= 0.0 {
                trace!(locked = %locked, hover = %hover, "dwell lock released");
                return (self.reset(), None);
            }
            return (Self { progress, ..self }, None);
        }

        let elapsed = now_ms.saturating_sub(self.start_ms);
        if elapsed >= config.dwell_ms {
            debug!(target = %locked, elapsed_ms = elapsed, "dwell complete");
            let next = Self {
                last_fire_ms: Some(now_ms),
                ..Self::default()
            };
            return (next, Some(locked));
        }

        let progress = (elapsed as f64 / config.dwell_ms.max(1) as f64).clamp(0.0, 1.0);
        (Self { progress, ..self }, None)
    }
}
