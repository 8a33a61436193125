//! Core navigation state machine
//!
//! Handles transitions between Idle, Grid and Explain based on dwell
//! selections, the Cancel key, and content arriving from the backend.
//! Fetches are requested through [`NavAction`]s; the engine runs them and
//! feeds the outcomes back in, tagged with the request id they belong to.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::EngineEvent;
use crate::fetch::{FetchError, RequestId, MAX_FOLLOWUPS, MAX_QUESTIONS};
use crate::hit::{Screen, Target};

/// The three navigation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Blank page with the microphone button
    #[default]
    Idle,
    /// Question tiles plus Back
    Grid,
    /// One explanation with follow-ups
    Explain,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "Idle"),
            Mode::Grid => write!(f, "Grid"),
            Mode::Explain => write!(f, "Explain"),
        }
    }
}

/// Side effects requested by a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Fetch an explanation (and then follow-ups) for this question
    FetchExplanation { prompt: String, question: String },
    /// Start or stop the external recorder
    ToggleMic { start: bool },
}

/// The state machine that owns the mode and the content shown in it
pub struct NavMachine {
    /// Current mode
    mode: Mode,
    /// Time when the current mode was entered
    mode_entered_at: Instant,
    /// Transcript the content was generated from
    prompt: Option<String>,
    questions: Vec<String>,
    active_question: String,
    explanation: String,
    followups: Vec<String>,
    selected_followup: Option<usize>,
    error: Option<String>,
    loading_explanation: bool,
    loading_followups: bool,
    /// Explanation request whose outcomes are still wanted
    active_request: Option<RequestId>,
    /// Questions request whose outcome is still wanted
    questions_request: Option<RequestId>,
    /// Switch to Explain once the active request's explanation settles
    enter_explain_on_settle: bool,
    recording: bool,
    transcribing: bool,
    /// Channel for emitting events
    event_tx: broadcast::Sender<EngineEvent>,
}

impl NavMachine {
    /// Create a new machine in Idle
    pub fn new(event_tx: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            mode: Mode::Idle,
            mode_entered_at: Instant::now(),
            prompt: None,
            questions: Vec::new(),
            active_question: String::new(),
            explanation: String::new(),
            followups: Vec::new(),
            selected_followup: None,
            error: None,
            loading_explanation: false,
            loading_followups: false,
            active_request: None,
            questions_request: None,
            enter_explain_on_settle: false,
            recording: false,
            transcribing: false,
            event_tx,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn active_question(&self) -> &str {
        &self.active_question
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn followups(&self) -> &[String] {
        &self.followups
    }

    pub fn selected_followup(&self) -> Option<usize> {
        self.selected_followup
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn loading_explanation(&self) -> bool {
        self.loading_explanation
    }

    pub fn loading_followups(&self) -> bool {
        self.loading_followups
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn transcribing(&self) -> bool {
        self.transcribing
    }

    pub fn active_request(&self) -> Option<RequestId> {
        self.active_request
    }

    /// Whether the blocking overlay is up
    pub fn overlay_visible(&self) -> bool {
        self.loading_explanation || self.transcribing
    }

    /// The hit-testing view of the current mode
    pub fn screen(&self) -> Screen {
        match self.mode {
            Mode::Idle => Screen::Idle,
            Mode::Grid => Screen::Grid {
                question_count: self.questions.len(),
            },
            Mode::Explain => Screen::Explain {
                followup_count: self.followups.len(),
            },
        }
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn set_transcribing(&mut self, transcribing: bool) {
        self.transcribing = transcribing;
    }

    /// Remember the transcript a questions request was made for
    pub fn begin_questions(&mut self, id: RequestId, prompt: String) {
        self.prompt = Some(prompt);
        self.questions_request = Some(id);
        self.error = None;
    }

    /// Handle a dwell selection
    pub fn select(&mut self, target: Target) -> Option<NavAction> {
        match (self.mode, target) {
            (Mode::Idle, Target::Mic) => Some(NavAction::ToggleMic { start: !self.recording }),

            (Mode::Grid, Target::Back) => {
                self.clear();
                None
            }

            (Mode::Grid, Target::Slot(i)) => {
                let question = self.questions.get(usize::from(i))?.clone();
                let Some(prompt) = self.prompt.clone() else {
                    warn!(slot = i, "question selected without a prompt");
                    return None;
                };
                Some(NavAction::FetchExplanation { prompt, question })
            }

            (Mode::Explain, Target::Back) => {
                self.transition_to(Mode::Grid);
                None
            }

            (Mode::Explain, Target::FollowUp(k)) => {
                let idx = usize::from(k);
                let question = self.followups.get(idx)?.clone();
                let prompt = self.prompt.clone().unwrap_or_default();
                self.selected_followup = Some(idx);
                Some(NavAction::FetchExplanation { prompt, question })
            }

            (mode, target) => {
                debug!(%mode, %target, "selection does not apply to this mode");
                None
            }
        }
    }

    /// Step back exactly one level
    pub fn cancel(&mut self) {
        match self.mode {
            Mode::Idle => debug!("cancel at idle ignored"),
            Mode::Grid => self.clear(),
            Mode::Explain => self.transition_to(Mode::Grid),
        }
    }

    /// Drop the question set and fetch state and return to Idle
    pub fn clear(&mut self) {
        self.questions.clear();
        self.active_question.clear();
        self.explanation.clear();
        self.followups.clear();
        self.selected_followup = None;
        self.error = None;
        self.loading_explanation = false;
        self.loading_followups = false;
        self.active_request = None;
        self.questions_request = None;
        self.enter_explain_on_settle = false;

        if self.mode != Mode::Idle {
            self.transition_to(Mode::Idle);
        }
        let _ = self.event_tx.send(EngineEvent::Cleared);
    }

    /// An explanation request was issued for `question`
    pub fn begin_explanation(&mut self, id: RequestId, question: String) {
        self.active_request = Some(id);
        self.active_question = question;
        self.explanation.clear();
        self.followups.clear();
        self.error = None;
        self.loading_explanation = true;
        self.loading_followups = false;
        self.enter_explain_on_settle = self.mode == Mode::Grid;
        if self.mode != Mode::Explain {
            self.selected_followup = None;
        }
    }

    fn is_current(&self, id: RequestId) -> bool {
        if self.active_request == Some(id) {
            true
        } else {
            debug!(id, active = ?self.active_request, "discarding stale content outcome");
            false
        }
    }

    /// Apply a questions response; returns false if it was stale
    pub fn apply_questions(
        &mut self,
        id: RequestId,
        result: Result<Vec<String>, FetchError>,
    ) -> bool {
        if self.questions_request != Some(id) {
            debug!(id, "discarding stale questions outcome");
            return false;
        }
        self.questions_request = None;

        match result {
            Ok(mut questions) => {
                questions.truncate(MAX_QUESTIONS);
                self.questions = questions;
                let _ = self.event_tx.send(EngineEvent::QuestionsReady {
                    count: self.questions.len(),
                });
                self.sync_mode_with_questions();
            }
            Err(e) => self.fail(e),
        }
        true
    }

    /// Idle <-> Grid follows whether questions exist; Explain is left alone
    fn sync_mode_with_questions(&mut self) {
        match (self.mode, self.questions.is_empty()) {
            (Mode::Idle, false) => self.transition_to(Mode::Grid),
            (Mode::Grid, true) => self.transition_to(Mode::Idle),
            _ => {}
        }
    }

    /// Apply an explanation response; returns false if it was stale
    pub fn apply_explanation(
        &mut self,
        id: RequestId,
        question: &str,
        result: Result<String, FetchError>,
    ) -> bool {
        if !self.is_current(id) {
            return false;
        }

        match result {
            Ok(text) => {
                self.explanation = text;
                self.loading_followups = true;
                let _ = self.event_tx.send(EngineEvent::ExplanationReady {
                    question: question.to_string(),
                });
            }
            Err(e) => {
                self.explanation.clear();
                self.fail(e);
            }
        }
        self.loading_explanation = false;
        self.enter_explain_if_pending();
        true
    }

    /// Apply a follow-ups response; returns false if it was stale
    pub fn apply_followups(
        &mut self,
        id: RequestId,
        result: Result<Vec<String>, FetchError>,
    ) -> bool {
        if !self.is_current(id) {
            return false;
        }

        match result {
            Ok(mut followups) => {
                followups.truncate(MAX_FOLLOWUPS);
                self.followups = followups;
                self.selected_followup = None;
                let _ = self.event_tx.send(EngineEvent::FollowUpsReady {
                    count: self.followups.len(),
                });
            }
            Err(e) => self.fail(e),
        }
        self.loading_followups = false;
        true
    }

    /// The request task ended; clear loading flags no matter what happened
    pub fn settle(&mut self, id: RequestId) {
        if self.questions_request == Some(id) {
            // task ended without a usable answer
            self.questions_request = None;
        }
        if self.active_request != Some(id) {
            return;
        }
        self.loading_explanation = false;
        self.loading_followups = false;
        self.enter_explain_if_pending();
    }

    fn enter_explain_if_pending(&mut self) {
        if std::mem::take(&mut self.enter_explain_on_settle) && self.mode == Mode::Grid {
            self.transition_to(Mode::Explain);
        }
    }

    fn fail(&mut self, error: FetchError) {
        let message = error.to_string();
        warn!(%message, mode = %self.mode, "content request failed");
        self.error = Some(message.clone());
        let _ = self.event_tx.send(EngineEvent::FetchFailed { message });
    }

    /// Perform a mode transition
    fn transition_to(&mut self, new_mode: Mode) {
        let old_mode = self.mode;
        if old_mode == new_mode {
            return;
        }
        let duration_ms = self.mode_entered_at.elapsed().as_millis() as u64;

        info!(
            from = %old_mode,
            to = %new_mode,
            duration_ms = duration_ms,
            "mode transition"
        );

        self.mode = new_mode;
        self.mode_entered_at = Instant::now();

        let event = EngineEvent::ModeChanged {
            from: old_mode,
            to: new_mode,
            duration_ms,
        };
        debug!(?event, "emitting mode event");
        let _ = self.event_tx.send(event);
    }
}
