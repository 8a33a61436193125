//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::engine::{Command, RenderState};
use crate::events::EngineEvent;
use crate::signal::Viewport;

/// Requests from a renderer or controller to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request the current render state
    GetStatus,

    /// Subscribe to engine event notifications
    Subscribe,

    /// Step back one level (Escape key)
    Cancel,

    /// Drop all content and return to Idle
    Clear,

    /// Transcript to generate questions for
    SubmitPrompt { prompt: String },

    /// Recorder state changed
    SetRecording { recording: bool },

    /// Transcription started or finished
    SetTranscribing { active: bool },

    /// Screen size in pixels
    SetViewport { width: f64, height: f64 },

    /// Whether a speech recorder is attached
    SetSpeechSupport { supported: bool },
}

impl Request {
    /// The engine command this request maps to, if any
    pub fn into_command(self) -> Option<Command> {
        match self {
            Request::Ping | Request::GetStatus | Request::Subscribe => None,
            Request::Cancel => Some(Command::Cancel),
            Request::Clear => Some(Command::Clear),
            Request::SubmitPrompt { prompt } => Some(Command::SubmitPrompt { prompt }),
            Request::SetRecording { recording } => Some(Command::SetRecording { recording }),
            Request::SetTranscribing { active } => Some(Command::SetTranscribing { active }),
            Request::SetViewport { width, height } => {
                Some(Command::SetViewport(Viewport { width, height }))
            }
            Request::SetSpeechSupport { supported } => {
                Some(Command::SetSpeechSupport { supported })
            }
        }
    }
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Command accepted by the engine
    Ack,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An engine event occurred
    #[serde(rename = "notification")]
    Event { event: EngineEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// What the renderer should be showing
    pub render: RenderState,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            render: RenderState::default(),
        }
    }
}
