//! gaze-nav: hands-free navigation driven by gaze position and blinks
//!
//! Turns a continuous, noisy stream of `(x, y, blink, calibrated)` samples
//! into discrete selections:
//! - dwell on a region to select it, with sticky targets and cooldown
//! - double blink to capture a calibration point, long blink to reset
//! - a three-mode navigation machine (Idle, Grid, Explain) fed by an
//!   external content backend
//!
//! The [`engine::Engine`] owns every component and runs them on one tick
//! loop; the daemon binary wires it to Unix sockets and HTTP backends.

pub mod blink;
pub mod calibration;
pub mod config;
pub mod dwell;
pub mod engine;
pub mod events;
pub mod fetch;
pub mod hit;
pub mod http;
pub mod ipc;
pub mod lifecycle;
pub mod nav;
pub mod signal;
