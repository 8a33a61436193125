//! Calibration session
//!
//! Walks the user through five fixation points. Each capture is a call to
//! the external calibration service; the service answers `ok: false` when it
//! could not see a face, in which case the step does not advance. A reset
//! sends the session back to the first point.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::http::HttpError;

/// Fixation points, in capture order
pub const POINTS: [&str; 5] = ["TOP-LEFT", "TOP-RIGHT", "BOTTOM-LEFT", "BOTTOM-RIGHT", "CENTER"];

/// Failures of the calibration service
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("No face detected. Try again.")]
    NoFace,

    #[error("{0}")]
    Service(String),
}

/// The external calibration endpoints
#[async_trait]
pub trait CalibrationBackend: Send + Sync {
    async fn reset(&self) -> Result<(), CalibrationError>;

    /// Capture the current point; `false` means no face was found
    async fn capture(&self) -> Result<bool, CalibrationError>;
}

/// Completion of a calibration call
#[derive(Debug)]
pub enum CalibrationOutcome {
    Captured(Result<bool, CalibrationError>),
    Reset(Result<(), CalibrationError>),
}

/// What changed after applying an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationUpdate {
    Advanced { step: usize },
    Reset,
    Failed { message: String },
}

/// Serializable view for renderers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationView {
    pub step: usize,
    pub total: usize,
    pub point: Option<String>,
    pub busy: bool,
    pub error: Option<String>,
}

/// Step tracker plus the client that talks to the service
pub struct CalibrationSession {
    backend: Arc<dyn CalibrationBackend>,
    tx: mpsc::UnboundedSender<CalibrationOutcome>,
    step: usize,
    busy: bool,
    error: Option<String>,
}

impl CalibrationSession {
    pub fn new(
        backend: Arc<dyn CalibrationBackend>,
        tx: mpsc::UnboundedSender<CalibrationOutcome>,
    ) -> Self {
        Self {
            backend,
            tx,
            step: 0,
            busy: false,
            error: None,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_done(&self) -> bool {
        self.step >= POINTS.len()
    }

    pub fn view(&self) -> CalibrationView {
        CalibrationView {
            step: self.step,
            total: POINTS.len(),
            point: POINTS.get(self.step).map(|p| p.to_string()),
            busy: self.busy,
            error: self.error.clone(),
        }
    }

    /// Start a capture call; refused while another call is running
    pub fn request_capture(&mut self) -> bool {
        if self.busy {
            warn!("calibration call in progress, capture skipped");
            return false;
        }
        self.busy = true;
        self.error = None;
        info!(step = self.step, point = ?POINTS.get(self.step), "capturing calibration point");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.capture().await;
            let _ = tx.send(CalibrationOutcome::Captured(result));
        });
        true
    }

    /// Start a reset call; refused while another call is running
    pub fn request_reset(&mut self) -> bool {
        if self.busy {
            warn!("calibration call in progress, reset skipped");
            return false;
        }
        self.busy = true;
        self.error = None;
        info!("resetting calibration");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.reset().await;
            let _ = tx.send(CalibrationOutcome::Reset(result));
        });
        true
    }

    /// Apply a finished call
    pub fn apply(&mut self, outcome: CalibrationOutcome) -> CalibrationUpdate {
        self.busy = false;

        let failure = match outcome {
            CalibrationOutcome::Captured(Ok(true)) => {
                self.step = (self.step + 1).min(POINTS.len());
                self.error = None;
                info!(step = self.step, "calibration point captured");
                return CalibrationUpdate::Advanced { step: self.step };
            }
            CalibrationOutcome::Reset(Ok(())) => {
                self.step = 0;
                self.error = None;
                return CalibrationUpdate::Reset;
            }
            CalibrationOutcome::Captured(Ok(false)) => CalibrationError::NoFace,
            CalibrationOutcome::Captured(Err(e)) | CalibrationOutcome::Reset(Err(e)) => e,
        };

        let message = failure.to_string();
        warn!(%message, step = self.step, "calibration call failed");
        self.error = Some(message.clone());
        CalibrationUpdate::Failed { message }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted calibration service; captures pop answers, defaulting to ok
    #[derive(Debug, Default)]
    pub struct FakeCalibration {
        pub captures: Mutex<VecDeque<Result<bool, String>>>,
        pub resets: Mutex<usize>,
    }

    #[async_trait]
    impl CalibrationBackend for FakeCalibration {
        async fn reset(&self) -> Result<(), CalibrationError> {
            *self.resets.lock().unwrap() += 1;
            Ok(())
        }

        async fn capture(&self) -> Result<bool, CalibrationError> {
            match self.captures.lock().unwrap().pop_front() {
                Some(Ok(ok)) => Ok(ok),
                Some(Err(msg)) => Err(CalibrationError::Service(msg)),
                None => Ok(true),
            }
        }
    }
}
