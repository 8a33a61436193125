//! Capture countdown started by a double blink
//!
//! Three visible steps (3, 2, 1) of roughly a third of a second each, then
//! the capture request goes out. Blinks do not cancel it.

use serde::{Deserialize, Serialize};

/// Countdown timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownConfig {
    pub steps: u8,
    pub step_ms: u64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            steps: 3,
            step_ms: 333,
        }
    }
}

/// Result of polling a running countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    /// Displayed number changed
    Step(u8),
    /// Nothing new this tick
    Unchanged,
    /// Countdown finished; time to capture
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Running {
    started_ms: u64,
    shown: u8,
}

/// Optional running countdown
#[derive(Debug, Clone, Copy, Default)]
pub struct Countdown {
    config: CountdownConfig,
    running: Option<Running>,
}

impl Countdown {
    pub fn new(config: CountdownConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Number currently displayed, if running
    pub fn remaining(&self) -> Option<u8> {
        self.running.map(|r| r.shown)
    }

    /// Start counting; ignored if already running
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.running.is_some() {
            return false;
        }
        self.running = Some(Running {
            started_ms: now_ms,
            shown: self.config.steps,
        });
        true
    }

    pub fn poll(&mut self, now_ms: u64) -> CountdownStatus {
        let Some(mut running) = self.running else {
            return CountdownStatus::Unchanged;
        };

        let elapsed_steps = now_ms.saturating_sub(running.started_ms) / self.config.step_ms.max(1);
        if elapsed_steps >= u64::from(self.config.steps) {
            self.running = None;
            return CountdownStatus::Done;
        }

        let shown = self.config.steps - elapsed_steps as u8;
        if shown != running.shown {
            running.shown = shown;
            self.running = Some(running);
            CountdownStatus::Step(shown)
        } else {
            CountdownStatus::Unchanged
        }
    }

    pub fn cancel(&mut self) {
        self.running = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_down_then_completes() {
        let mut cd = Countdown::new(CountdownConfig::default());
        assert!(cd.start(1000));
        assert_eq!(cd.remaining(), Some(3));

        assert_eq!(cd.poll(1100), CountdownStatus::Unchanged);
        assert_eq!(cd.poll(1333), CountdownStatus::Step(2));
        assert_eq!(cd.poll(1666), CountdownStatus::Step(1));
        assert_eq!(cd.poll(1900), CountdownStatus::Unchanged);
        assert_eq!(cd.poll(1999), CountdownStatus::Done);
        assert!(!cd.is_running());
        assert_eq!(cd.poll(2500), CountdownStatus::Unchanged);
    }

    #[test]
    fn test_restart_while_running_is_ignored() {
        let mut cd = Countdown::new(CountdownConfig::default());
        assert!(cd.start(0));
        assert!(!cd.start(200));
        assert_eq!(cd.poll(999), CountdownStatus::Done);
    }
}
