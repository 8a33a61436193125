//! IPC module for daemon-renderer communication

pub mod codec;
mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::Server;
