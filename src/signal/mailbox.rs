//! Single-slot "last value wins" sample mailbox
//!
//! Backed by `tokio::sync::watch`: every publish overwrites the slot, so a
//! slow consumer never sees a backlog, only the newest sample. The slot also
//! records whether a producer is connected; a dropped producer leaves a
//! neutral sample behind instead of its last reading.

use tokio::sync::watch;

use super::sample::GazeSample;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    sample: GazeSample,
    connected: bool,
}

/// Writer half, held by the gaze feed
#[derive(Debug, Clone)]
pub struct SampleMailbox {
    tx: watch::Sender<Slot>,
}

/// Reader half, held by the engine
#[derive(Debug, Clone)]
pub struct SampleReader {
    rx: watch::Receiver<Slot>,
}

impl SampleMailbox {
    /// Create a disconnected mailbox seeded with the default (centre,
    /// uncalibrated) sample
    pub fn new() -> (Self, SampleReader) {
        let (tx, rx) = watch::channel(Slot::default());
        (Self { tx }, SampleReader { rx })
    }

    /// Overwrite the slot with a newer sample from a live producer
    pub fn publish(&self, sample: GazeSample) {
        // send_replace never fails, even with no live readers
        self.tx.send_replace(Slot {
            sample,
            connected: true,
        });
    }

    /// The producer went away; forget its last reading
    pub fn disconnect(&self) {
        self.tx.send_replace(Slot::default());
    }

    pub fn latest(&self) -> GazeSample {
        self.tx.borrow().sample
    }

    pub fn subscribe(&self) -> SampleReader {
        SampleReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl SampleReader {
    /// Copy out the most recent sample
    pub fn latest(&self) -> GazeSample {
        self.rx.borrow().sample
    }

    /// Whether a producer is currently feeding samples
    pub fn is_connected(&self) -> bool {
        self.rx.borrow().connected
    }
}
