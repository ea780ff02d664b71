use std::collections::BTreeMap;

use serde::Serialize;

pub const MIN_COLUMN_WIDTH: u32 = 80;
pub const MAX_COLUMN_WIDTH: u32 = 1000;

pub fn clamp_width(width: i64) -> u32 {
    width.clamp(MIN_COLUMN_WIDTH as i64, MAX_COLUMN_WIDTH as i64) as u32
}

/// User chosen column widths in pixels. Columns without an entry use their
/// intrinsic width. Every stored value lies in
/// [`MIN_COLUMN_WIDTH`, `MAX_COLUMN_WIDTH`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnWidths(BTreeMap<String, u32>);

impl ColumnWidths {
    pub fn get(&self, column: &str) -> Option<u32> {
        self.0.get(column).copied()
    }

    pub fn width_for(&self, column: &str, intrinsic: u32) -> u32 {
        self.get(column).unwrap_or(intrinsic)
    }

    /// Stores a clamped width and returns the stored value.
    pub fn set(&mut self, column: &str, width: i64) -> u32 {
        let width = clamp_width(width);
        self.0.insert(column.to_string(), width);
        width
    }

    /// Drops the entry, returning whether there was one.
    pub fn reset(&mut self, column: &str) -> bool {
        self.0.remove(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Baseline captured when a resize drag starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeDrag {
    pub column: String,
    pub baseline_width: u32,
    pub baseline_x: i64,
}

impl ResizeDrag {
    /// `current_width` is the stored width if any, else the rendered one.
    pub fn begin(column: &str, current_width: u32, x: i64) -> Self {
        Self {
            column: column.to_string(),
            baseline_width: current_width,
            baseline_x: x,
        }
    }

    pub fn width_at(&self, x: i64) -> u32 {
        clamp_width(self.baseline_width as i64 + (x - self.baseline_x))
    }

    pub fn apply(&self, widths: &mut ColumnWidths, x: i64) -> u32 {
        widths.set(&self.column, i64::from(self.width_at(x)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderHit {
    /// Column body, activates sorting.
    Label(usize),
    /// Right edge of the column, starts a resize.
    Handle(usize),
}

/// Locates `x` inside a header whose columns start at `left` and are
/// `widths` cells wide, separated by one spacer cell.
pub fn hit_test(left: u16, widths: &[u16], x: u16) -> Option<HeaderHit> {
    let mut start = left;
    for (idx, &w) in widths.iter().enumerate() {
        let end = start.saturating_add(w);
        if x >= start && x < end {
            return Some(if x + 1 == end {
                HeaderHit::Handle(idx)
            } else {
                HeaderHit::Label(idx)
            });
        }
        // The spacer right after a column belongs to its handle.
        if x == end {
            return Some(HeaderHit::Handle(idx));
        }
        start = end.saturating_add(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_is_clamped() {
        let mut widths = ColumnWidths::default();
        let drag = ResizeDrag::begin("name", 120, 500);
        assert_eq!(drag.apply(&mut widths, 530), 150);
        assert_eq!(widths.get("name"), Some(150));
        assert_eq!(drag.apply(&mut widths, -10_000), MIN_COLUMN_WIDTH);
        assert_eq!(drag.apply(&mut widths, 10_000), MAX_COLUMN_WIDTH);
        for delta in (-2000..2000).step_by(37) {
            let w = drag.width_at(500 + delta);
            assert!((MIN_COLUMN_WIDTH..=MAX_COLUMN_WIDTH).contains(&w));
        }
    }

    #[test]
    fn reset_removes_entry() {
        let mut widths = ColumnWidths::default();
        widths.set("a", 5);
        assert_eq!(widths.get("a"), Some(MIN_COLUMN_WIDTH));
        assert!(widths.reset("a"));
        assert_eq!(widths.get("a"), None);
        assert_eq!(widths.width_for("a", 64), 64);
        assert!(!widths.reset("a"));
    }

    #[test]
    fn header_hit_testing() {
        // Columns at [2..6) and [7..10).
        let widths = [4, 3];
        assert_eq!(hit_test(2, &widths, 1), None);
        assert_eq!(hit_test(2, &widths, 2), Some(HeaderHit::Label(0)));
        assert_eq!(hit_test(2, &widths, 5), Some(HeaderHit::Handle(0)));
        assert_eq!(hit_test(2, &widths, 6), Some(HeaderHit::Handle(0)));
        assert_eq!(hit_test(2, &widths, 7), Some(HeaderHit::Label(1)));
        assert_eq!(hit_test(2, &widths, 9), Some(HeaderHit::Handle(1)));
        assert_eq!(hit_test(2, &widths, 11), None);
    }
}
