//! Configuration loading and management
//!
//! Everything comes from the environment, with defaults that match the
//! stock tuning. Invalid values are an error rather than silently ignored.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::engine::EngineConfig;
use crate::signal::Viewport;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Invalid configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set")]
    MissingHome,

    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for control IPC
    pub socket_path: PathBuf,

    /// Path to the Unix domain socket the gaze producer connects to
    pub feed_socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Base URL of the calibration and content services
    pub api_base: String,

    /// Per-request timeout for backend calls
    pub request_timeout: Duration,

    /// Viewport assumed until a renderer reports its own
    pub viewport: Viewport,

    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok()).context("invalid configuration")
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").ok_or(ConfigError::MissingHome)?;
        let data_dir = PathBuf::from(&home).join(".local").join("share").join("gaze-nav");

        let socket_path = lookup("GAZE_NAV_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));
        let feed_socket_path = lookup("GAZE_NAV_FEED_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("gaze.sock"));

        let api_base = lookup("GAZE_NAV_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut engine = EngineConfig::default();
        if let Some(ms) = parse_var(&lookup, "GAZE_NAV_DWELL_MS", "duration in milliseconds")? {
            engine.dwell.dwell_ms = positive(ms, "GAZE_NAV_DWELL_MS")?;
        }
        if let Some(ms) = parse_var(&lookup, "GAZE_NAV_COOLDOWN_MS", "duration in milliseconds")? {
            engine.dwell.cooldown_ms = ms;
        }
        if let Some(decay) = parse_var::<f64, _>(&lookup, "GAZE_NAV_DWELL_DECAY", "decay step")? {
            if !(decay > 0.0 && decay <= 1.0) {
                return Err(invalid(
                    "GAZE_NAV_DWELL_DECAY",
                    decay.to_string(),
                    "decay step in (0, 1]",
                ));
            }
            engine.dwell.decay_per_tick = decay;
        }
        if let Some(hz) = parse_var::<u32, _>(&lookup, "GAZE_NAV_TICK_HZ", "tick rate")? {
            if !(1..=1000).contains(&hz) {
                return Err(invalid("GAZE_NAV_TICK_HZ", hz.to_string(), "tick rate in 1..=1000"));
            }
            engine.tick_hz = hz;
        }
        read_blink_timing(&lookup, &mut engine)?;

        let viewport = match lookup("GAZE_NAV_VIEWPORT") {
            Some(raw) => parse_viewport(&raw)
                .ok_or_else(|| invalid("GAZE_NAV_VIEWPORT", raw, "WIDTHxHEIGHT size"))?,
            None => Viewport::default(),
        };

        let timeout_secs = parse_var(&lookup, "GAZE_NAV_REQUEST_TIMEOUT_SECS", "number of seconds")?
            .unwrap_or(30);
        let timeout_secs = positive(timeout_secs, "GAZE_NAV_REQUEST_TIMEOUT_SECS")?;
        let request_timeout = Duration::from_secs(timeout_secs);

        Ok(Self {
            socket_path,
            feed_socket_path,
            data_dir,
            api_base,
            request_timeout,
            viewport,
            engine,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn invalid(var: &'static str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::Invalid { var, value, expected }
}

fn parse_var<T, F>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(var, raw, expected)),
        None => Ok(None),
    }
}

fn positive(value: u64, var: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(invalid(var, value.to_string(), "value above zero"));
    }
    Ok(value)
}

/// Blink gesture thresholds and the calibration countdown step
fn read_blink_timing<F>(lookup: &F, engine: &mut EngineConfig) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const MS: &str = "duration in milliseconds";
    let blink = &mut engine.blink;

    if let Some(ms) = parse_var(lookup, "GAZE_NAV_BLINK_MAX_PULSE_MS", MS)? {
        blink.max_pulse_ms = positive(ms, "GAZE_NAV_BLINK_MAX_PULSE_MS")?;
    }
    if let Some(ms) = parse_var(lookup, "GAZE_NAV_DOUBLE_BLINK_MIN_GAP_MS", MS)? {
        blink.double_min_gap_ms = ms;
    }
    if let Some(ms) = parse_var(lookup, "GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS", MS)? {
        blink.double_max_gap_ms = positive(ms, "GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS")?;
    }
    if blink.double_min_gap_ms > blink.double_max_gap_ms {
        return Err(invalid(
            "GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS",
            blink.double_max_gap_ms.to_string(),
            "gap not below GAZE_NAV_DOUBLE_BLINK_MIN_GAP_MS",
        ));
    }
    if let Some(ms) = parse_var(lookup, "GAZE_NAV_HOLD_HINT_MS", MS)? {
        blink.hold_hint_ms = positive(ms, "GAZE_NAV_HOLD_HINT_MS")?;
    }
    if let Some(ms) = parse_var(lookup, "GAZE_NAV_LONG_BLINK_MS", MS)? {
        blink.long_blink_ms = positive(ms, "GAZE_NAV_LONG_BLINK_MS")?;
    }
    if blink.hold_hint_ms >= blink.long_blink_ms {
        return Err(invalid(
            "GAZE_NAV_LONG_BLINK_MS",
            blink.long_blink_ms.to_string(),
            "duration above GAZE_NAV_HOLD_HINT_MS",
        ));
    }

    if let Some(ms) = parse_var(lookup, "GAZE_NAV_COUNTDOWN_STEP_MS", MS)? {
        engine.countdown.step_ms = positive(ms, "GAZE_NAV_COUNTDOWN_STEP_MS")?;
    }
    Ok(())
}

fn parse_viewport(raw: &str) -> Option<Viewport> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let width: f64 = w.trim().parse().ok()?;
    let height: f64 = h.trim().parse().ok()?;
    (width >= 1.0 && height >= 1.0).then_some(Viewport { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("HOME", "/home/ana")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/home/ana/.local/share/gaze-nav"));
        assert_eq!(config.socket_path, config.data_dir.join("daemon.sock"));
        assert_eq!(config.feed_socket_path, config.data_dir.join("gaze.sock"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HOME", "/home/ana"),
            ("GAZE_NAV_SOCKET", "/tmp/ctl.sock"),
            ("GAZE_NAV_DWELL_MS", "1500"),
            ("GAZE_NAV_COOLDOWN_MS", "0"),
            ("GAZE_NAV_DWELL_DECAY", "0.05"),
            ("GAZE_NAV_TICK_HZ", "30"),
            ("GAZE_NAV_VIEWPORT", "1280x800"),
        ])
        .unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/ctl.sock"));
        assert_eq!(config.engine.dwell.dwell_ms, 1500);
        assert_eq!(config.engine.dwell.cooldown_ms, 0);
        assert_eq!(config.engine.dwell.decay_per_tick, 0.05);
        assert_eq!(config.engine.tick_hz, 30);
        assert_eq!(
            config.viewport,
            Viewport {
                width: 1280.0,
                height: 800.0
            }
        );
    }

    #[test]
    fn test_blink_timing_overrides() {
        let config = load(&[
            ("HOME", "/home/ana"),
            ("GAZE_NAV_BLINK_MAX_PULSE_MS", "600"),
            ("GAZE_NAV_DOUBLE_BLINK_MIN_GAP_MS", "0"),
            ("GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS", "900"),
            ("GAZE_NAV_HOLD_HINT_MS", "1500"),
            ("GAZE_NAV_LONG_BLINK_MS", "3000"),
            ("GAZE_NAV_COUNTDOWN_STEP_MS", "500"),
        ])
        .unwrap();
        let blink = config.engine.blink;
        assert_eq!(blink.max_pulse_ms, 600);
        assert_eq!(blink.double_min_gap_ms, 0);
        assert_eq!(blink.double_max_gap_ms, 900);
        assert_eq!(blink.hold_hint_ms, 1500);
        assert_eq!(blink.long_blink_ms, 3000);
        assert_eq!(config.engine.countdown.step_ms, 500);
        assert_eq!(config.engine.countdown.steps, 3);
    }

    #[test]
    fn test_blink_windows_must_be_ordered() {
        // hint at or past the long blink, against the stock hint of 1000
        let err = load(&[("HOME", "/h"), ("GAZE_NAV_LONG_BLINK_MS", "1000")]).unwrap_err();
        assert!(err.to_string().starts_with("GAZE_NAV_LONG_BLINK_MS"), "{err}");

        let err = load(&[("HOME", "/h"), ("GAZE_NAV_DOUBLE_BLINK_MIN_GAP_MS", "800")]).unwrap_err();
        assert!(err.to_string().starts_with("GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS"), "{err}");

        // an empty window of exactly one gap is allowed
        let config = load(&[
            ("HOME", "/h"),
            ("GAZE_NAV_DOUBLE_BLINK_MIN_GAP_MS", "300"),
            ("GAZE_NAV_DOUBLE_BLINK_MAX_GAP_MS", "300"),
        ])
        .unwrap();
        assert_eq!(config.engine.blink.double_min_gap_ms, 300);
    }

    #[test]
    fn test_missing_home() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingHome)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (var, value) in [
            ("GAZE_NAV_DWELL_MS", "soon"),
            ("GAZE_NAV_DWELL_MS", "0"),
            ("GAZE_NAV_DWELL_DECAY", "1.5"),
            ("GAZE_NAV_TICK_HZ", "0"),
            ("GAZE_NAV_VIEWPORT", "wide"),
            ("GAZE_NAV_VIEWPORT", "0x600"),
            ("GAZE_NAV_REQUEST_TIMEOUT_SECS", "-1"),
            ("GAZE_NAV_BLINK_MAX_PULSE_MS", "0"),
            ("GAZE_NAV_HOLD_HINT_MS", "long"),
            ("GAZE_NAV_COUNTDOWN_STEP_MS", "0"),
        ] {
            let err = load(&[("HOME", "/h"), (var, value)]).unwrap_err();
            assert!(err.to_string().starts_with(var), "{var}={value}: {err}");
        }
    }
}
