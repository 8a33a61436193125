//! Blink gestures
//!
//! Recognises double and long blinks from the raw eyelid flag and runs the
//! capture countdown a double blink starts.

mod countdown;
mod recognizer;

pub use countdown::{Countdown, CountdownConfig, CountdownStatus};
pub use recognizer::{BlinkConfig, BlinkEvent, BlinkRecognizer, DoubleBlinkGate};
