//! Canonical gaze sample and inbound frame parsing
//!
//! The vision pipeline sends JSON objects shaped like
//! `{"x": 0.41, "y": 0.66, "blink": false, "calibrated": true, "ts_ms": 1712}`.
//! Coordinates are usually already normalized, but some producers send
//! pixels, so the viewport is used as a fallback divisor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Screen size used to normalize pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// A point in normalized screen space, both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The latest gaze reading, normalized and clamped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    pub blink: bool,
    pub calibrated: bool,
    /// Producer timestamp in milliseconds
    pub ts_ms: u64,
}

impl Default for GazeSample {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            blink: false,
            calibrated: false,
            ts_ms: 0,
        }
    }
}

impl GazeSample {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Reasons an inbound frame is rejected
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("field `{0}` is missing or not a number")]
    NonNumeric(&'static str),
}

/// Parse one inbound frame into a canonical sample
///
/// Only `x` and `y` are mandatory. Missing or mistyped `blink` and
/// `calibrated` read as false, a missing `ts_ms` reads as 0.
pub fn parse_sample(frame: &[u8], viewport: Viewport) -> Result<GazeSample, SignalError> {
    let value: Value = serde_json::from_slice(frame)?;
    let obj = value.as_object().ok_or(SignalError::NotAnObject)?;

    let x = number_field(obj.get("x")).ok_or(SignalError::NonNumeric("x"))?;
    let y = number_field(obj.get("y")).ok_or(SignalError::NonNumeric("y"))?;
    let (x, y) = normalize(x, y, viewport);

    let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    let ts_ms = obj
        .get("ts_ms")
        .and_then(Value::as_f64)
        .filter(|ts| ts.is_finite() && *ts >= 0.0)
        .map(|ts| ts as u64)
        .unwrap_or(0);

    Ok(GazeSample {
        x,
        y,
        blink: flag("blink"),
        calibrated: flag("calibrated"),
        ts_ms,
    })
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Map raw coordinates into [0, 1]
///
/// Values already inside the unit square pass through. Anything else is
/// treated as pixels and divided by the viewport, then clamped.
pub fn normalize(x: f64, y: f64, viewport: Viewport) -> (f64, f64) {
    if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
        return (x, y);
    }

    let w = viewport.width.max(1.0);
    let h = viewport.height.max(1.0);
    (clamp01(x / w), clamp01(y / h))
}

pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalized_frame() {
        let frame = br#"{"x":0.3,"y":0.7,"blink":true,"calibrated":true,"ts_ms":1500}"#;
        let sample = parse_sample(frame, Viewport::default()).unwrap();
        assert_eq!(sample.x, 0.3);
        assert_eq!(sample.y, 0.7);
        assert!(sample.blink);
        assert!(sample.calibrated);
        assert_eq!(sample.ts_ms, 1500);
    }

    #[test]
    fn test_parse_pixel_frame_uses_viewport() {
        let frame = br#"{"x":960,"y":270}"#;
        let viewport = Viewport {
            width: 1920.0,
            height: 1080.0,
        };
        let sample = parse_sample(frame, viewport).unwrap();
        assert_eq!(sample.x, 0.5);
        assert_eq!(sample.y, 0.25);
        assert!(!sample.blink);
        assert!(!sample.calibrated);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let (x, y) = normalize(-40.0, 5000.0, Viewport::default());
        assert_eq!(x, 0.0);
        assert_eq!(y, 1.0);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let frame = br#"{"x":"left","y":0.2}"#;
        assert!(matches!(
            parse_sample(frame, Viewport::default()),
            Err(SignalError::NonNumeric("x"))
        ));

        assert!(matches!(
            parse_sample(b"[1,2]", Viewport::default()),
            Err(SignalError::NotAnObject)
        ));
        assert!(parse_sample(b"not json", Viewport::default()).is_err());
    }
}
