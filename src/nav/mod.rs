//! Navigation state machine module
//!
//! Provides an explicit state machine with three modes:
//! - Idle: no content, microphone button only
//! - Grid: up to five question tiles plus Back
//! - Explain: one explanation plus up to two follow-ups

mod machine;

pub use machine::{Mode, NavAction, NavMachine};
