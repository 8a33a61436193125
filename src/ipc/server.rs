//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of engine
//! events to subscribed clients. Commands are forwarded to the engine task;
//! status is read from the engine's render snapshot.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::engine::{Command, RenderState};
use crate::events::EngineEvent;

use super::codec::{read_frame, send_message};
use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Handles the engine exposes to clients
#[derive(Clone)]
struct ClientContext {
    commands: mpsc::Sender<Command>,
    render: watch::Receiver<RenderState>,
    events: broadcast::Sender<EngineEvent>,
    started_at: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    context: ClientContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the control socket
    pub fn bind(
        socket_path: &Path,
        commands: mpsc::Sender<Command>,
        render: watch::Receiver<RenderState>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            context: ClientContext {
                commands,
                render,
                events,
                started_at: Instant::now(),
            },
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
///
/// Frames are read on their own task so a half-read request is never
/// dropped when a notification wins the select.
async fn handle_client<S>(stream: S, context: ClientContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (frame_tx, mut frame_rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(16);

    let reader_task = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if frame_tx.send(Ok(frame)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = frame_tx.send(Err(e)).await;
                    break;
                }
            }
        }
    });

    let mut events: Option<broadcast::Receiver<EngineEvent>> = None;

    let result = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        break Err(anyhow::Error::from(e).context("failed to read request"));
                    }
                    None => {
                        debug!("client disconnected");
                        break Ok(());
                    }
                };

                let response = match serde_json::from_slice::<Request>(&frame) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        let subscribe = request == Request::Subscribe;
                        let response = process_request(request, &context).await;
                        if subscribe && events.is_none() {
                            events = Some(context.events.subscribe());
                            debug!("client subscribed to notifications");
                        }
                        response
                    }
                    Err(e) => {
                        warn!(%e, "malformed request");
                        Response::error("bad_request", e.to_string())
                    }
                };

                if let Err(e) = send_message(&mut writer, &response).await {
                    break Err(anyhow::Error::from(e).context("failed to send response"));
                }
            }

            event = next_event(&mut events) => {
                match event {
                    Ok(event) => {
                        if let Err(e) = notify(&mut writer, event).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = None;
                    }
                }
            }
        }
    };

    reader_task.abort();
    result
}

/// Wait for the next event, or forever if not subscribed
async fn next_event(
    events: &mut Option<broadcast::Receiver<EngineEvent>>,
) -> Result<EngineEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn notify<S>(writer: &mut WriteHalf<S>, event: EngineEvent) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    send_message(writer, &Notification::Event { event })
        .await
        .context("failed to push notification")
}

/// Process a request and return a response
async fn process_request(request: Request, context: &ClientContext) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::GetStatus => Response::Status(DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: context.started_at.elapsed().as_secs(),
            render: context.render.borrow().clone(),
        }),

        Request::Subscribe => Response::Subscribed,

        other => {
            let Some(command) = other.into_command() else {
                return Response::error("unsupported", "request has no engine command");
            };
            match context.commands.send(command).await {
                Ok(()) => Response::Ack,
                Err(_) => Response::error("engine_unavailable", "engine is not running"),
            }
        }
    }
}
