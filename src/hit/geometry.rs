//! Mode-specific region geometry
//!
//! All rectangles are in normalized screen space and use half-open
//! intervals: a point on a shared edge belongs to the region below/right of
//! it. The screen's own far edge (1.0) is folded into the last cell so a
//! fully clamped sample still lands somewhere.

use crate::signal::Point;

use super::Target;

/// Half-open rectangle `[left, left + width) x [top, top + height)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// Fractional position of `p` inside the rect, each axis in [0, 1)
    fn relative(&self, p: Point) -> (f64, f64) {
        ((p.x - self.left) / self.width, (p.y - self.top) / self.height)
    }
}

/// Centered microphone button on the idle page
pub const MIC_RECT: Rect = Rect::new(0.25, 0.25, 0.50, 0.55);

/// Question grid overlay
pub const GRID_RECT: Rect = Rect::new(0.06, 0.06, 0.88, 0.72);
pub const GRID_COLS: usize = 3;
pub const GRID_ROWS: usize = 2;
/// Last grid cell, always the Back tile
pub const GRID_BACK_INDEX: usize = GRID_COLS * GRID_ROWS - 1;

/// Left edge of the interactive side column in explain mode
pub const EXPLAIN_SIDE_LEFT: f64 = 0.5;
/// Bottom edge of the Back card in explain mode
pub const EXPLAIN_BACK_BOTTOM: f64 = 0.22;

pub fn hit_idle(p: Point) -> Option<Target> {
    MIC_RECT.contains(p).then_some(Target::Mic)
}

/// Map a point to a grid cell index 0..=5, ignoring content
pub fn grid_cell(p: Point) -> Option<usize> {
    if !GRID_RECT.contains(p) {
        return None;
    }

    let (rel_x, rel_y) = GRID_RECT.relative(p);
    let col = ((rel_x * GRID_COLS as f64).floor() as usize).min(GRID_COLS - 1);
    let row = ((rel_y * GRID_ROWS as f64).floor() as usize).min(GRID_ROWS - 1);
    Some(row * GRID_COLS + col)
}

/// Grid hit: Back is always live, a question cell only if it has content
pub fn hit_grid(p: Point, question_count: usize) -> Option<Target> {
    let idx = grid_cell(p)?;
    if idx == GRID_BACK_INDEX {
        Some(Target::Back)
    } else if idx < question_count {
        Some(Target::Slot(idx as u8))
    } else {
        None
    }
}

/// Explain hit: the right half holds Back on top and two follow-up bands
pub fn hit_explain(p: Point, followup_count: usize) -> Option<Target> {
    if p.x < EXPLAIN_SIDE_LEFT || p.x > 1.0 || p.y < 0.0 || p.y > 1.0 {
        return None;
    }

    if p.y < EXPLAIN_BACK_BOTTOM {
        return Some(Target::Back);
    }

    if followup_count < 2 {
        return None;
    }

    let rel_y = (p.y - EXPLAIN_BACK_BOTTOM) / (1.0 - EXPLAIN_BACK_BOTTOM);
    if rel_y < 0.5 {
        Some(Target::FollowUp(0))
    } else {
        Some(Target::FollowUp(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_rect_is_half_open() {
        let r = Rect::new(0.0, 0.0, 0.5, 0.5);
        assert!(r.contains(p(0.0, 0.0)));
        assert!(!r.contains(p(0.5, 0.25)));
        assert!(!r.contains(p(0.25, 0.5)));
    }

    #[test]
    fn test_mic_bounds() {
        assert_eq!(hit_idle(p(0.5, 0.5)), Some(Target::Mic));
        assert_eq!(hit_idle(p(0.25, 0.25)), Some(Target::Mic));
        assert_eq!(hit_idle(p(0.75, 0.5)), None);
        assert_eq!(hit_idle(p(0.5, 0.81)), None);
        assert_eq!(hit_idle(p(0.1, 0.5)), None);
    }

    #[test]
    fn test_grid_cells_linearize_row_major() {
        // cell centres: columns at 0.06 + (i + 0.5) * 0.88/3, rows at 0.06 + (j + 0.5) * 0.36
        let cols = [0.2067, 0.5, 0.7933];
        let rows = [0.24, 0.60];
        for (row, y) in rows.iter().enumerate() {
            for (col, x) in cols.iter().enumerate() {
                assert_eq!(grid_cell(p(*x, *y)), Some(row * GRID_COLS + col));
            }
        }
    }

    #[test]
    fn test_grid_outside_is_none() {
        let outside = [
            p(0.05, 0.5),
            p(0.94, 0.5),
            p(0.5, 0.05),
            p(0.5, 0.78),
            p(1.0, 1.0),
            p(0.0, 0.0),
        ];
        for pt in outside {
            assert_eq!(hit_grid(pt, 5), None, "{pt:?}");
        }
    }

    #[test]
    fn test_grid_shared_edge_resolves_once() {
        let edge_x = 0.06 + 0.88 / 3.0;
        assert_eq!(grid_cell(p(edge_x - 1e-9, 0.2)), Some(0));
        assert_eq!(grid_cell(p(edge_x + 1e-9, 0.2)), Some(1));

        let edge_y = 0.06 + 0.72 / 2.0;
        assert_eq!(grid_cell(p(0.1, edge_y - 1e-9)), Some(0));
        assert_eq!(grid_cell(p(0.1, edge_y + 1e-9)), Some(3));
    }

    #[test]
    fn test_explain_regions() {
        assert_eq!(hit_explain(p(0.49, 0.1), 2), None);
        assert_eq!(hit_explain(p(0.5, 0.0), 2), Some(Target::Back));
        assert_eq!(hit_explain(p(0.7, 0.22), 2), Some(Target::FollowUp(0)));
        assert_eq!(hit_explain(p(0.7, 0.60), 2), Some(Target::FollowUp(0)));
        assert_eq!(hit_explain(p(0.7, 0.65), 2), Some(Target::FollowUp(1)));
        assert_eq!(hit_explain(p(1.0, 1.0), 2), Some(Target::FollowUp(1)));
    }

    #[test]
    fn test_explain_followups_inert_below_two() {
        for count in [0, 1] {
            for y in [0.3, 0.5, 0.7, 0.99] {
                assert_eq!(hit_explain(p(0.8, y), count), None);
            }
            assert_eq!(hit_explain(p(0.8, 0.1), count), Some(Target::Back));
        }
    }
}
