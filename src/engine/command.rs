//! Control commands delivered to the engine from IPC clients

use crate::signal::Viewport;

/// Requests that mutate engine state
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Step back one level (the Escape key)
    Cancel,
    /// Drop everything and return to Idle
    Clear,
    /// A finished transcript; fetch questions for it
    SubmitPrompt { prompt: String },
    /// Recorder started or stopped
    SetRecording { recording: bool },
    /// Transcription started or finished
    SetTranscribing { active: bool },
    /// Screen size changed
    SetViewport(Viewport),
    /// A speech recorder attached or went away
    SetSpeechSupport { supported: bool },
}

/// Failures inside the engine itself
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("speech recognition is not supported by any attached recorder")]
    RecognitionUnsupported,
}
