//! Blink gesture recognition
//!
//! Works purely from the blink boolean and the engine clock. Two gestures
//! are recognised:
//!
//! - double blink: two short pulses whose ends are 50-700ms apart
//! - long blink: one closure held past 2s, with a "holding" hint after 1s
//!
//! The closure state is rebuilt on every eye-open, so a run of quick blinks
//! can never add up to a long blink.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Blink gesture thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkConfig {
    /// Closures at or above this are not pulses
    pub max_pulse_ms: u64,
    /// Inclusive bounds for the gap between two pulse ends
    pub double_min_gap_ms: u64,
    pub double_max_gap_ms: u64,
    /// Closure after which the holding hint shows
    pub hold_hint_ms: u64,
    /// Closure after which the long blink fires
    pub long_blink_ms: u64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            max_pulse_ms: 800,
            double_min_gap_ms: 50,
            double_max_gap_ms: 700,
            hold_hint_ms: 1000,
            long_blink_ms: 2000,
        }
    }
}

/// Gestures and indicator changes produced by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlinkEvent {
    /// Two quick pulses while uncalibrated and idle
    DoubleBlink,
    /// Holding hint switched on or off
    Holding { active: bool },
    /// Continuous closure passed the long-blink threshold
    LongBlinkReset,
}

/// Conditions under which a double blink is allowed to fire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoubleBlinkGate {
    pub calibrated: bool,
    pub countdown_running: bool,
}

impl DoubleBlinkGate {
    fn is_open(&self) -> bool {
        !self.calibrated && !self.countdown_running
    }
}

/// Tracks eyelid closure over time
#[derive(Debug, Clone, Default)]
pub struct BlinkRecognizer {
    config: BlinkConfig,
    /// Set while the eyes are shut
    closed_since: Option<u64>,
    /// End of the previous qualifying pulse
    last_pulse_end: Option<u64>,
    holding: bool,
    /// Long blink already fired for the current closure
    long_fired: bool,
}

impl BlinkRecognizer {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Feed the current blink flag
    ///
    /// Called once per engine tick. While the eyes are shut this doubles as
    /// the hold monitor; it stops the moment the eyes open.
    pub fn update(&mut self, blink: bool, now_ms: u64, gate: DoubleBlinkGate) -> Vec<BlinkEvent> {
        if blink {
            self.on_closed(now_ms)
        } else {
            self.on_open(now_ms, gate)
        }
    }

    fn on_closed(&mut self, now_ms: u64) -> Vec<BlinkEvent> {
        let mut events = Vec::new();
        let since = *self.closed_since.get_or_insert(now_ms);
        let closure = now_ms.saturating_sub(since);

        if self.long_fired {
            return events;
        }

        if closure >= self.config.long_blink_ms {
            self.long_fired = true;
            if self.holding {
                self.holding = false;
                events.push(BlinkEvent::Holding { active: false });
            }
            info!(closure_ms = closure, "long blink detected");
            events.push(BlinkEvent::LongBlinkReset);
        } else if !self.holding && closure >= self.config.hold_hint_ms {
            self.holding = true;
            events.push(BlinkEvent::Holding { active: true });
        }

        events
    }

    fn on_open(&mut self, now_ms: u64, gate: DoubleBlinkGate) -> Vec<BlinkEvent> {
        let mut events = Vec::new();
        let Some(since) = self.closed_since.take() else {
            return events;
        };

        let closure = now_ms.saturating_sub(since);
        let long_fired = std::mem::take(&mut self.long_fired);

        if std::mem::take(&mut self.holding) {
            events.push(BlinkEvent::Holding { active: false });
        }

        if long_fired || closure >= self.config.max_pulse_ms {
            // a deliberate closure breaks any pending pair
            self.last_pulse_end = None;
            return events;
        }

        let paired = self.last_pulse_end.is_some_and(|prev| {
            let gap = now_ms.saturating_sub(prev);
            (self.config.double_min_gap_ms..=self.config.double_max_gap_ms).contains(&gap)
        });

        if paired && gate.is_open() {
            debug!(closure_ms = closure, "double blink detected");
            self.last_pulse_end = None;
            events.push(BlinkEvent::DoubleBlink);
        } else {
            self.last_pulse_end = Some(now_ms);
        }

        events
    }

    /// Forget everything, e.g. on teardown or when the feed drops
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}
