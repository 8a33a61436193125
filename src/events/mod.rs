//! Events module for engine notifications
//!
//! Structured events for mode transitions, selections, blink gestures,
//! calibration progress and content fetches. Broadcast to every subscribed
//! IPC client and to the daemon's own logging loop.

use serde::{Deserialize, Serialize};

use crate::hit::Target;
use crate::nav::Mode;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Navigation mode changed
    ModeChanged {
        from: Mode,
        to: Mode,
        /// How long the previous mode was active
        duration_ms: u64,
    },

    /// A dwell completed on a target
    Selected { target: Target },

    /// The recorder should start or stop
    MicToggled { start: bool },

    /// A new question set arrived
    QuestionsReady { count: usize },

    /// Explanation text arrived for the active question
    ExplanationReady { question: String },

    /// Follow-ups arrived for the active question
    FollowUpsReady { count: usize },

    /// A content request failed
    FetchFailed { message: String },

    /// Question set and fetch state were dropped
    Cleared,

    /// Two quick blinks; the capture countdown starts
    DoubleBlinkDetected,

    /// Countdown number shown to the user
    CountdownStep { remaining: u8 },

    /// Calibration point captured
    CalibrationCaptured { step: usize },

    /// Calibration went back to the first point
    CalibrationReset,

    /// Capture or reset failed
    CalibrationFailed { message: String },

    /// Long-blink holding hint on or off
    LongBlinkHolding { active: bool },

    /// Continuous closure passed the reset threshold
    LongBlinkReset,
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::ModeChanged { from, to, duration_ms } => {
                write!(f, "MODE_CHANGED ({} -> {}, {}ms)", from, to, duration_ms)
            }
            EngineEvent::Selected { target } => write!(f, "SELECTED ({})", target),
            EngineEvent::MicToggled { start } => write!(f, "MIC_TOGGLED (start={})", start),
            EngineEvent::QuestionsReady { count } => write!(f, "QUESTIONS_READY ({})", count),
            EngineEvent::ExplanationReady { .. } => write!(f, "EXPLANATION_READY"),
            EngineEvent::FollowUpsReady { count } => write!(f, "FOLLOWUPS_READY ({})", count),
            EngineEvent::FetchFailed { message } => write!(f, "FETCH_FAILED ({})", message),
            EngineEvent::Cleared => write!(f, "CLEARED"),
            EngineEvent::DoubleBlinkDetected => write!(f, "DOUBLE_BLINK_DETECTED"),
            EngineEvent::CountdownStep { remaining } => write!(f, "COUNTDOWN_STEP ({})", remaining),
            EngineEvent::CalibrationCaptured { step } => {
                write!(f, "CALIBRATION_CAPTURED ({}/5)", step)
            }
            EngineEvent::CalibrationReset => write!(f, "CALIBRATION_RESET"),
            EngineEvent::CalibrationFailed { message } => {
                write!(f, "CALIBRATION_FAILED ({})", message)
            }
            EngineEvent::LongBlinkHolding { active } => {
                write!(f, "LONG_BLINK_HOLDING ({})", active)
            }
            EngineEvent::LongBlinkReset => write!(f, "LONG_BLINK_RESET"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::ModeChanged {
            from: Mode::Grid,
            to: Mode::Explain,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("mode_changed"));
        assert!(json.contains("\"from\":\"grid\""));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"double_blink_detected"}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, EngineEvent::DoubleBlinkDetected));

        let json = r#"{"type":"selected","target":{"kind":"follow_up","index":1}}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            EngineEvent::Selected {
                target: Target::FollowUp(1)
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(EngineEvent::CountdownStep { remaining: 2 }.to_string(), "COUNTDOWN_STEP (2)");
    }
}
