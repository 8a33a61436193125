//! Signal source adapter
//!
//! Turns the external gaze stream into canonical [`GazeSample`]s published
//! through a last-value-wins mailbox.

pub mod feed;
mod mailbox;
mod sample;

pub use feed::{FeedStats, GazeFeed};
pub use mailbox::{SampleMailbox, SampleReader};
pub use sample::{clamp01, normalize, parse_sample, GazeSample, Point, SignalError, Viewport};
