//! Gaze stream listener
//!
//! The vision pipeline connects to a Unix domain socket and streams
//! length-prefixed JSON samples. Only one producer is served at a time; when
//! it disconnects the listener waits for the next one. Reconnection is the
//! producer's business.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncRead;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ipc::codec::read_frame;

use super::mailbox::SampleMailbox;
use super::sample::{parse_sample, Viewport};

/// Counters for a single producer connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Frames parsed and published
    pub accepted: u64,
    /// Frames discarded as malformed
    pub dropped: u64,
}

/// Accepts gaze producers and publishes their samples
pub struct GazeFeed {
    socket_path: PathBuf,
    listener: UnixListener,
    mailbox: SampleMailbox,
    viewport: watch::Receiver<Viewport>,
}

impl GazeFeed {
    /// Bind the feed socket, replacing any stale socket file
    pub fn bind(
        socket_path: &Path,
        mailbox: SampleMailbox,
        viewport: watch::Receiver<Viewport>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create feed socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale feed socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind gaze feed socket")?;

        info!(?socket_path, "gaze feed listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            mailbox,
            viewport,
        })
    }

    /// Serve producers one after another until the task is dropped
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    info!("gaze producer connected");
                    match serve_producer(stream, &self.mailbox, &self.viewport).await {
                        Ok(stats) => {
                            info!(
                                accepted = stats.accepted,
                                dropped = stats.dropped,
                                "gaze producer disconnected"
                            );
                        }
                        Err(e) => {
                            warn!(?e, "gaze producer connection failed");
                        }
                    }
                }
                Err(e) => {
                    error!(?e, "gaze feed accept error");
                }
            }
        }
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove feed socket file");
            }
        }
    }
}

/// Serve one producer connection, leaving the mailbox disconnected afterwards
///
/// Whatever ends the stream, the engine must stop acting on the last sample.
pub async fn serve_producer<R>(
    reader: R,
    mailbox: &SampleMailbox,
    viewport: &watch::Receiver<Viewport>,
) -> std::io::Result<FeedStats>
where
    R: AsyncRead + Unpin,
{
    let result = pump_frames(reader, mailbox, viewport).await;
    mailbox.disconnect();
    result
}

/// Read frames until EOF, publishing every well-formed sample
///
/// Malformed frames are counted and skipped; they never end the stream.
pub async fn pump_frames<R>(
    mut reader: R,
    mailbox: &SampleMailbox,
    viewport: &watch::Receiver<Viewport>,
) -> std::io::Result<FeedStats>
where
    R: AsyncRead + Unpin,
{
    let mut stats = FeedStats::default();

    while let Some(frame) = read_frame(&mut reader).await? {
        let vp = *viewport.borrow();
        match parse_sample(&frame, vp) {
            Ok(sample) => {
                mailbox.publish(sample);
                stats.accepted += 1;
            }
            Err(e) => {
                debug!(%e, "dropping malformed gaze frame");
                stats.dropped += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::codec::write_frame;

    #[tokio::test]
    async fn test_pump_skips_bad_frames_and_keeps_latest() {
        let (mailbox, reader) = SampleMailbox::new();
        let (_vp_tx, vp_rx) = watch::channel(Viewport::default());
        let (mut producer, consumer) = tokio::io::duplex(1024);

        write_frame(&mut producer, br#"{"x":0.1,"y":0.2,"calibrated":true}"#).await.unwrap();
        write_frame(&mut producer, br#"{"x":null,"y":0.2}"#).await.unwrap();
        write_frame(&mut producer, b"garbage").await.unwrap();
        write_frame(&mut producer, br#"{"x":0.9,"y":0.8,"blink":true,"ts_ms":42}"#).await.unwrap();
        drop(producer);

        let stats = pump_frames(consumer, &mailbox, &vp_rx).await.unwrap();
        assert_eq!(stats, FeedStats { accepted: 2, dropped: 2 });

        let latest = reader.latest();
        assert_eq!((latest.x, latest.y), (0.9, 0.8));
        assert!(latest.blink);
        assert_eq!(latest.ts_ms, 42);
    }

    #[tokio::test]
    async fn test_pump_uses_current_viewport() {
        let (mailbox, reader) = SampleMailbox::new();
        let (vp_tx, vp_rx) = watch::channel(Viewport::default());
        vp_tx.send_replace(Viewport {
            width: 800.0,
            height: 600.0,
        });

        let (mut producer, consumer) = tokio::io::duplex(256);
        write_frame(&mut producer, br#"{"x":400,"y":150}"#).await.unwrap();
        drop(producer);

        pump_frames(consumer, &mailbox, &vp_rx).await.unwrap();
        let latest = reader.latest();
        assert_eq!((latest.x, latest.y), (0.5, 0.25));
    }

    #[tokio::test]
    async fn test_producer_drop_disconnects_mailbox() {
        let (mailbox, reader) = SampleMailbox::new();
        let (_vp_tx, vp_rx) = watch::channel(Viewport::default());
        let (mut producer, consumer) = tokio::io::duplex(256);

        write_frame(&mut producer, br#"{"x":0.5,"y":0.5,"blink":true,"calibrated":true}"#)
            .await
            .unwrap();
        drop(producer);

        let stats = serve_producer(consumer, &mailbox, &vp_rx).await.unwrap();
        assert_eq!(stats.accepted, 1);
        assert!(!reader.is_connected());
        let latest = reader.latest();
        assert!(!latest.blink);
        assert!(!latest.calibrated);
    }
}
