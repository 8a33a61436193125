//! Hit testing
//!
//! Pure mapping from (screen, point) to the hoverable target under the
//! point. The screen variant carries exactly the content counts that decide
//! which regions are live, so the same point can resolve differently as
//! content arrives.

pub mod geometry;

use serde::{Deserialize, Serialize};

use crate::signal::Point;

pub use geometry::{hit_explain, hit_grid, hit_idle};

/// A hoverable region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Target {
    /// Microphone button on the idle page
    Mic,
    /// Question tile 0..=4 in the grid
    Slot(u8),
    /// Back tile (grid) or back card (explain)
    Back,
    /// Follow-up band 0 or 1 in explain mode
    FollowUp(u8),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Mic => write!(f, "mic"),
            Target::Slot(i) => write!(f, "slot{}", i),
            Target::Back => write!(f, "back"),
            Target::FollowUp(i) => write!(f, "followup{}", i),
        }
    }
}

/// What is on screen, reduced to what hit testing needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Idle,
    Grid { question_count: usize },
    Explain { followup_count: usize },
}

/// Resolve the target under `point` for the given screen
pub fn hit_test(screen: Screen, point: Point) -> Option<Target> {
    match screen {
        Screen::Idle => hit_idle(point),
        Screen::Grid { question_count } => hit_grid(point, question_count),
        Screen::Explain { followup_count } => hit_explain(point, followup_count),
    }
}
