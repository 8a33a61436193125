//! Gaze interaction engine
//!
//! Owns every component and advances them on a fixed-rate tick. Between
//! ticks it consumes backend outcomes and control commands; all state lives
//! on the single engine task, so nothing here is shared or locked.
//!
//! One tick:
//! 1. read the latest sample (last value wins)
//! 2. blink recognizer, capture countdown
//! 3. hit test against the current mode, dwell
//! 4. apply a selection to the navigation machine
//! 5. publish the render snapshot

mod command;
mod render;

pub use command::{Command, EngineError};
pub use render::RenderState;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::blink::{
    BlinkConfig, BlinkEvent, BlinkRecognizer, Countdown, CountdownConfig, CountdownStatus,
    DoubleBlinkGate,
};
use crate::calibration::{
    CalibrationBackend, CalibrationOutcome, CalibrationSession, CalibrationUpdate,
};
use crate::dwell::{DwellConfig, DwellState};
use crate::events::EngineEvent;
use crate::fetch::{ContentBackend, FetchCoordinator, FetchOutcome};
use crate::hit::{hit_test, Target};
use crate::nav::{Mode, NavAction, NavMachine};
use crate::signal::{SampleReader, Viewport};

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dwell: DwellConfig,
    pub blink: BlinkConfig,
    pub countdown: CountdownConfig,
    /// Tick rate of the main loop
    pub tick_hz: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dwell: DwellConfig::default(),
            blink: BlinkConfig::default(),
            countdown: CountdownConfig::default(),
            tick_hz: 60,
        }
    }
}

impl EngineConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_hz.max(1)))
    }
}

pub struct Engine {
    config: EngineConfig,
    samples: SampleReader,
    nav: NavMachine,
    dwell: DwellState,
    hover: Option<Target>,
    /// Mode seen on the previous tick, to reset dwell on change
    last_mode: Mode,
    calibrated: bool,
    /// A producer was connected on the previous tick
    feed_live: bool,
    blink: BlinkRecognizer,
    countdown: Countdown,
    calibration: CalibrationSession,
    fetch: FetchCoordinator,
    fetch_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    calibration_rx: mpsc::UnboundedReceiver<CalibrationOutcome>,
    speech_supported: bool,
    event_tx: broadcast::Sender<EngineEvent>,
    viewport_tx: watch::Sender<Viewport>,
    render_tx: watch::Sender<RenderState>,
    started_at: Instant,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        samples: SampleReader,
        content: Arc<dyn ContentBackend>,
        calibration: Arc<dyn CalibrationBackend>,
        event_tx: broadcast::Sender<EngineEvent>,
        viewport_tx: watch::Sender<Viewport>,
    ) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (calibration_tx, calibration_rx) = mpsc::unbounded_channel();
        let (render_tx, _) = watch::channel(RenderState::default());

        Self {
            config,
            samples,
            nav: NavMachine::new(event_tx.clone()),
            dwell: DwellState::new(),
            hover: None,
            last_mode: Mode::Idle,
            calibrated: false,
            feed_live: false,
            blink: BlinkRecognizer::new(config.blink),
            countdown: Countdown::new(config.countdown),
            calibration: CalibrationSession::new(calibration, calibration_tx),
            fetch: FetchCoordinator::new(content, fetch_tx),
            fetch_rx,
            calibration_rx,
            speech_supported: false,
            event_tx,
            viewport_tx,
            render_tx,
            started_at: Instant::now(),
        }
    }

    /// Receiver for render snapshots
    pub fn render_state(&self) -> watch::Receiver<RenderState> {
        self.render_tx.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.nav.mode()
    }

    /// Run the engine until the command channel closes
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_hz = self.config.tick_hz, "engine started in Idle mode");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_ms = self.started_at.elapsed().as_millis() as u64;
                    self.tick(now_ms);
                }
                Some(outcome) = self.fetch_rx.recv() => self.handle_fetch(outcome),
                Some(outcome) = self.calibration_rx.recv() => self.handle_calibration(outcome),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        info!("engine stopped");
    }

    /// Wait for and apply the next backend outcome
    pub async fn next_outcome(&mut self) {
        tokio::select! {
            Some(outcome) = self.fetch_rx.recv() => self.handle_fetch(outcome),
            Some(outcome) = self.calibration_rx.recv() => self.handle_calibration(outcome),
        }
    }

    /// Advance one frame at `now_ms`
    pub fn tick(&mut self, now_ms: u64) {
        if !self.samples.is_connected() {
            if self.feed_live {
                self.drop_gaze_input();
            }
            self.publish();
            return;
        }
        if !self.feed_live {
            info!("gaze feed live");
            self.feed_live = true;
        }

        let sample = self.samples.latest();

        if sample.calibrated != self.calibrated {
            info!(calibrated = sample.calibrated, "calibration state changed");
            self.calibrated = sample.calibrated;
        }

        self.tick_blink(sample.blink, now_ms);
        self.tick_countdown(now_ms);

        let mode = self.nav.mode();
        if mode != self.last_mode {
            self.dwell = self.dwell.reset();
            self.last_mode = mode;
        }

        let hover = if !sample.calibrated || self.nav.overlay_visible() {
            None
        } else {
            hit_test(self.nav.screen(), sample.point())
        };
        if hover != self.hover {
            trace!(?hover, "hover changed");
            self.hover = hover;
        }

        let (dwell, fired) = self.dwell.tick(hover, now_ms, &self.config.dwell);
        self.dwell = dwell;

        if let Some(target) = fired {
            self.select(target);
        }

        self.publish();
    }

    /// The producer went away: nothing it sent may still drive a gesture
    fn drop_gaze_input(&mut self) {
        info!("gaze feed lost, dropping gesture state");
        if self.blink.is_holding() {
            self.emit(EngineEvent::LongBlinkHolding { active: false });
        }
        self.blink.reset();
        self.countdown.cancel();
        self.dwell = self.dwell.reset();
        self.hover = None;
        self.calibrated = false;
        self.feed_live = false;
    }

    fn tick_blink(&mut self, blink: bool, now_ms: u64) {
        let gate = DoubleBlinkGate {
            calibrated: self.calibrated,
            countdown_running: self.countdown.is_running(),
        };

        for event in self.blink.update(blink, now_ms, gate) {
            match event {
                BlinkEvent::DoubleBlink => {
                    if self.countdown.start(now_ms) {
                        self.emit(EngineEvent::DoubleBlinkDetected);
                        self.emit(EngineEvent::CountdownStep {
                            remaining: self.config.countdown.steps,
                        });
                    }
                }
                BlinkEvent::Holding { active } => {
                    self.emit(EngineEvent::LongBlinkHolding { active });
                }
                BlinkEvent::LongBlinkReset => {
                    self.emit(EngineEvent::LongBlinkReset);
                    self.calibration.request_reset();
                }
            }
        }
    }

    fn tick_countdown(&mut self, now_ms: u64) {
        match self.countdown.poll(now_ms) {
            CountdownStatus::Step(remaining) => self.emit(EngineEvent::CountdownStep { remaining }),
            CountdownStatus::Done => {
                self.calibration.request_capture();
            }
            CountdownStatus::Unchanged => {}
        }
    }

    fn select(&mut self, target: Target) {
        info!(%target, mode = %self.nav.mode(), "selection");
        self.emit(EngineEvent::Selected { target });

        match self.nav.select(target) {
            Some(NavAction::FetchExplanation { prompt, question }) => {
                if let Some(id) = self.fetch.request_explanation(prompt, question.clone()) {
                    self.nav.begin_explanation(id, question);
                }
            }
            Some(NavAction::ToggleMic { start }) => {
                if let Err(e) = self.toggle_mic(start) {
                    warn!(error = %e, "mic selection ignored");
                }
            }
            None => {}
        }
        self.release_dropped_requests();
    }

    fn toggle_mic(&mut self, start: bool) -> Result<(), EngineError> {
        if !self.speech_supported {
            return Err(EngineError::RecognitionUnsupported);
        }
        self.emit(EngineEvent::MicToggled { start });
        Ok(())
    }

    /// Release the fetch guard if the machine stopped waiting for it
    fn release_dropped_requests(&mut self) {
        if let Some(id) = self.fetch.explanation_in_flight() {
            if self.nav.active_request() != Some(id) {
                self.fetch.invalidate();
            }
        }
    }

    pub fn handle_fetch(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Questions { id, result } => {
                self.nav.apply_questions(id, result);
            }
            FetchOutcome::Explanation { id, question, result } => {
                self.nav.apply_explanation(id, &question, result);
                self.fetch.explanation_done(id);
            }
            FetchOutcome::FollowUps { id, result } => {
                self.nav.apply_followups(id, result);
            }
            FetchOutcome::Settled { id } => {
                debug!(id, "request settled");
                self.fetch.settle(id);
                self.nav.settle(id);
            }
        }
        self.publish();
    }

    pub fn handle_calibration(&mut self, outcome: CalibrationOutcome) {
        let event = match self.calibration.apply(outcome) {
            CalibrationUpdate::Advanced { step } => EngineEvent::CalibrationCaptured { step },
            CalibrationUpdate::Reset => EngineEvent::CalibrationReset,
            CalibrationUpdate::Failed { message } => EngineEvent::CalibrationFailed { message },
        };
        self.emit(event);
        self.publish();
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!(?command, "command received");

        match command {
            Command::Cancel => self.nav.cancel(),
            Command::Clear => self.nav.clear(),
            Command::SubmitPrompt { prompt } => {
                if prompt.trim().is_empty() {
                    debug!("empty transcript, nothing to ask about");
                } else {
                    let id = self.fetch.request_questions(prompt.clone());
                    self.nav.begin_questions(id, prompt);
                }
            }
            Command::SetRecording { recording } => self.nav.set_recording(recording),
            Command::SetTranscribing { active } => self.nav.set_transcribing(active),
            Command::SetViewport(viewport) => {
                info!(width = viewport.width, height = viewport.height, "viewport updated");
                self.viewport_tx.send_replace(viewport);
            }
            Command::SetSpeechSupport { supported } => {
                info!(supported, "speech support updated");
                self.speech_supported = supported;
            }
        }
        self.release_dropped_requests();
        self.publish();
    }

    fn emit(&self, event: EngineEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Current render snapshot
    pub fn snapshot(&self) -> RenderState {
        RenderState {
            mode: self.nav.mode(),
            hover: self.hover,
            dwell_progress: self.dwell.progress(),
            calibrated: self.calibrated,
            prompt: self.nav.prompt().map(str::to_string),
            questions: self.nav.questions().to_vec(),
            active_question: self.nav.active_question().to_string(),
            explanation: self.nav.explanation().to_string(),
            followups: self.nav.followups().to_vec(),
            selected_followup: self.nav.selected_followup(),
            error: self.nav.error().map(str::to_string),
            loading_explanation: self.nav.loading_explanation(),
            loading_followups: self.nav.loading_followups(),
            recording: self.nav.recording(),
            transcribing: self.nav.transcribing(),
            overlay_visible: self.nav.overlay_visible(),
            calibration: self.calibration.view(),
            countdown: self.countdown.remaining(),
            blink_holding: self.blink.is_holding(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.render_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
