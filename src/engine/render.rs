//! Render snapshot published after every engine step

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationView;
use crate::hit::Target;
use crate::nav::Mode;

/// Everything a renderer needs to draw the current frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub mode: Mode,
    /// Region under the gaze that dwell is tracking
    pub hover: Option<Target>,
    /// Dwell feedback in [0, 1]
    pub dwell_progress: f64,
    pub calibrated: bool,
    pub prompt: Option<String>,
    pub questions: Vec<String>,
    pub active_question: String,
    pub explanation: String,
    pub followups: Vec<String>,
    pub selected_followup: Option<usize>,
    pub error: Option<String>,
    pub loading_explanation: bool,
    pub loading_followups: bool,
    pub recording: bool,
    pub transcribing: bool,
    /// Full-screen "please wait" layer; dwell is suspended while it is up
    pub overlay_visible: bool,
    pub calibration: CalibrationView,
    /// Capture countdown number, while running
    pub countdown: Option<u8>,
    /// Long-blink holding hint
    pub blink_holding: bool,
}
