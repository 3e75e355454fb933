//! Right-pane pixel -> left-pane pixel correspondence.
//!
//! `map[y]` is the left-pane row matching right-pane row `y`. Decorations fix
//! anchor pairs; rows between anchors are linearly interpolated.
//!
//! Invariants:
//! * `map.len() == height_right`.
//! * `map[0] == 0` and `map[len - 1] == height_left - 1` (saturating).
//! * Non-decreasing between anchors for ordered decorations.
//!
//! Deletions have no right-side extent, so the left pane would jump by the
//! whole deleted block at a single right row. The builder spreads that jump
//! over a window around the deletion: it starts bending at a settle point
//! `smoothing_window` rows before the deletion (half way back to the previous
//! anchor when the previous region was also a deletion) and catches up over
//! up to `smoothing_window` rows after it.

use crate::decorator::DecoratedDifference;
use crate::error::ScrollMapError;
use crate::geometry::PaneHeights;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrollMap {
    rows: Vec<u32>,
}

impl ScrollMap {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, right_row: usize) -> Option<u32> {
        self.rows.get(right_row).copied()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.rows.len().checked_sub(1)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.rows
    }

    /// Left-pane height this map was built for (`map[last] + 1`).
    pub fn left_height(&self) -> u32 {
        self.rows.last().map_or(0, |v| v.saturating_add(1))
    }

    /// Smallest right row whose left row is `>= left_row`, clamped to the
    /// last index. Used when the left pane drives the right one.
    pub fn reverse_lookup(&self, left_row: u32) -> Option<usize> {
        let last = self.last_index()?;
        Some(self.rows.partition_point(|&v| v < left_row).min(last))
    }
}

/// Result of one build; `truncated` is set when a decoration fell outside the
/// map and the walk stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollMapBuild {
    pub map: ScrollMap,
    pub truncated: Option<ScrollMapError>,
}

/// Round-half-away-from-zero division in 64-bit.
fn div_round(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (2 * n + d) / (2 * d)
    } else {
        -((-2 * n + d) / (2 * d))
    }
}

/// Fill the open interval `(start, end)` from the fixed endpoints.
fn interpolate(map: &mut [u32], start: usize, end: usize) {
    if end >= map.len() || end <= start + 1 {
        return;
    }
    let from = i64::from(map[start]);
    let to = i64::from(map[end]);
    let span = (end - start) as i64;
    for pos in start + 1..end {
        let step = div_round((to - from) * (pos - start) as i64, span);
        map[pos] = (from + step) as u32;
    }
}

/// Right row at which the map starts bending toward a deletion at `top_right`.
pub fn settle_point(
    last_offset: usize,
    top_right: usize,
    last_was_delete: bool,
    window: usize,
) -> usize {
    let candidate = if last_was_delete {
        (top_right + last_offset) / 2
    } else {
        top_right.saturating_sub(window)
    };
    candidate.max(last_offset)
}

fn check(index: usize, len: usize) -> Result<usize, ScrollMapError> {
    if index >= len {
        Err(ScrollMapError::IndexOutOfRange { index, len })
    } else {
        Ok(index)
    }
}

struct Builder<'a> {
    map: Vec<u32>,
    decorations: &'a [DecoratedDifference],
    left_last: u32,
    window: usize,
    last_offset: usize,
    last_was_delete: bool,
}

impl Builder<'_> {
    fn last(&self) -> usize {
        self.map.len() - 1
    }

    fn set(&mut self, index: usize, left: u32) {
        self.map[index] = left.min(self.left_last);
    }

    fn region(&mut self, i: usize) -> Result<(), ScrollMapError> {
        let len = self.map.len();
        let decorations = self.decorations;
        let dd = &decorations[i];
        let top_right = check(dd.top_right as usize, len)?;
        if top_right < self.last_offset {
            debug!(
                target: "align.scroll_map",
                index = i,
                top_right,
                last_offset = self.last_offset,
                "decoration_out_of_order"
            );
            return Ok(());
        }
        match dd.bottom_right {
            Some(bottom_right) => {
                let bottom_right = check(bottom_right as usize, len)?;
                let bottom_left = dd.bottom_left.unwrap_or(dd.top_left);
                self.set(top_right, dd.top_left);
                self.set(bottom_right, bottom_left);
                interpolate(&mut self.map, self.last_offset, top_right);
                interpolate(&mut self.map, top_right, bottom_right);
                self.last_offset = bottom_right;
                self.last_was_delete = false;
            }
            None => {
                let top_left = dd.top_left;
                let bottom_left = dd.bottom_left.unwrap_or(top_left);
                self.set(top_right, top_left);
                interpolate(&mut self.map, self.last_offset, top_right);
                let settle =
                    settle_point(self.last_offset, top_right, self.last_was_delete, self.window);

                let mut end = top_right.saturating_add(self.window).min(self.last());
                let mut ceiling = self.left_last;
                if let Some(next) = decorations.get(i + 1) {
                    let next_top = check(next.top_right as usize, len)?;
                    end = end.min(next_top.max(top_right));
                    ceiling = ceiling.min(next.top_left.max(bottom_left));
                }
                let catch_up = u32::try_from(end - top_right).unwrap_or(u32::MAX);
                let mut target = bottom_left.saturating_add(catch_up).min(ceiling);
                if end == self.last() {
                    target = self.left_last;
                }
                self.set(end, target);
                interpolate(&mut self.map, settle, end);
                self.last_offset = end;
                self.last_was_delete = true;
            }
        }
        Ok(())
    }
}

/// Build the map for `heights` from ordered decorations.
pub fn build_scroll_map(
    decorations: &[DecoratedDifference],
    heights: PaneHeights,
    smoothing_window: u32,
) -> ScrollMapBuild {
    let len = heights.right as usize;
    if len == 0 {
        return ScrollMapBuild {
            map: ScrollMap::default(),
            truncated: None,
        };
    }
    let left_last = heights.left.saturating_sub(1);
    let mut b = Builder {
        map: vec![0; len],
        decorations,
        left_last,
        window: smoothing_window as usize,
        last_offset: 0,
        last_was_delete: false,
    };
    let last = b.last();
    b.map[last] = left_last;
    b.map[0] = 0;

    let mut truncated = None;
    for i in 0..decorations.len() {
        if let Err(e) = b.region(i) {
            debug!(target: "align.scroll_map", error = %e, decoration = i, "scroll_map_truncated");
            truncated = Some(e);
            break;
        }
    }

    b.map[last] = left_last;
    b.map[0] = 0;
    let tail_start = b.last_offset.min(last);
    interpolate(&mut b.map, tail_start, last);
    ScrollMapBuild {
        map: ScrollMap { rows: b.map },
        truncated,
    }
}

/// Last built map, keyed by serial and both pane heights.
#[derive(Debug, Default)]
pub struct ScrollMapCache {
    key: Option<(u64, PaneHeights)>,
    map: Arc<ScrollMap>,
}

impl ScrollMapCache {
    pub fn lookup(&self, serial: u64, heights: PaneHeights) -> Option<Arc<ScrollMap>> {
        (self.key == Some((serial, heights))).then(|| self.map.clone())
    }

    pub fn store(&mut self, serial: u64, heights: PaneHeights, map: Arc<ScrollMap>) {
        self.key = Some((serial, heights));
        self.map = map;
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
