//! Difference -> pixel-space decoration.
//!
//! Each `DecoratedDifference` records where a difference starts and ends in
//! both panes so the divider can draw the connecting region and the scroll
//! map can anchor on it.
//!
//! Per kind (`y(n)` / `bottom(n)` are the top / bottom pixel of 1-based line n):
//! * Change: `[y(first_start), bottom(first_end)]` <-> `[y(second_start), bottom(second_end)]`.
//! * Add: left collapses to the point `bottom(first_end)` (0 before line 1),
//!   `bottom_left` is `None`.
//! * Delete: right collapses to the point `bottom(second_end)`, `bottom_right`
//!   is `None`.
//!
//! All-or-nothing: if any line cannot be resolved the result is empty. A
//! partial set would draw connectors against the wrong lines.

use crate::error::GeometryError;
use crate::geometry::{GuardedBlocks, LineGeometry};
use core_diff::{DiffKind, Difference, DocumentLines, Side};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedDifference {
    pub difference: Difference,
    pub top_left: u32,
    /// `None` for `Add` (nothing consumed on the left).
    pub bottom_left: Option<u32>,
    pub top_right: u32,
    /// `None` for `Delete` (nothing present on the right).
    pub bottom_right: Option<u32>,
    /// Rollback allowed: the affected right range avoids guarded blocks.
    pub can_rollback: bool,
    /// Region is painted as a filled block (Change) rather than an outline.
    pub flood_fill: bool,
}

impl DecoratedDifference {
    pub fn kind(&self) -> DiffKind {
        self.difference.kind
    }
}

/// Documents and geometry of both panes, sampled together on the UI thread.
#[derive(Clone, Copy)]
pub struct PaneSources<'a> {
    pub left: &'a dyn DocumentLines,
    pub right: &'a dyn DocumentLines,
    pub geometry: &'a dyn LineGeometry,
}

impl<'a> PaneSources<'a> {
    pub fn new(
        left: &'a dyn DocumentLines,
        right: &'a dyn DocumentLines,
        geometry: &'a dyn LineGeometry,
    ) -> Self {
        Self {
            left,
            right,
            geometry,
        }
    }

    pub fn document(&self, side: Side) -> &'a dyn DocumentLines {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Top and bottom pixel of 1-based `line`.
    fn line_span(&self, side: Side, line: usize) -> Result<(u32, u32), GeometryError> {
        let line0 = line.saturating_sub(1);
        let offset = self
            .document(side)
            .line_start_offset(line0)
            .ok_or(GeometryError::LineNotFound { side, line: line0 })?;
        let rect = self
            .geometry
            .rect_for_offset(side, offset)
            .ok_or(GeometryError::Unavailable { side, line: line0 })?;
        Ok((rect.y, rect.bottom()))
    }

    fn top(&self, side: Side, line: usize) -> Result<u32, GeometryError> {
        self.line_span(side, line).map(|(top, _)| top)
    }

    /// Bottom of 1-based `line`; line 0 (before the first line) is pixel 0.
    fn bottom(&self, side: Side, line: usize) -> Result<u32, GeometryError> {
        if line == 0 {
            return Ok(0);
        }
        self.line_span(side, line).map(|(_, bottom)| bottom)
    }
}

fn can_rollback(
    difference: &Difference,
    right: &dyn DocumentLines,
    guarded: &dyn GuardedBlocks,
) -> bool {
    if !guarded.has_guarded_blocks() {
        return true;
    }
    let offset = |line0: usize| right.line_start_offset(line0).unwrap_or(right.len());
    let (start, end) = match difference.kind {
        DiffKind::Delete => {
            let at = offset(difference.second_start.saturating_sub(1));
            (at, at)
        }
        DiffKind::Add | DiffKind::Change => (
            offset(difference.second_start.saturating_sub(1)),
            offset(difference.second_end),
        ),
    };
    !guarded.overlaps_guarded_block(start, end)
}

fn decorate_one(
    difference: &Difference,
    panes: &PaneSources<'_>,
    guarded: &dyn GuardedBlocks,
) -> Result<DecoratedDifference, GeometryError> {
    let d = difference;
    let (top_left, bottom_left, top_right, bottom_right) = match d.kind {
        DiffKind::Change => (
            panes.top(Side::Left, d.first_start)?,
            Some(panes.bottom(Side::Left, d.first_end)?),
            panes.top(Side::Right, d.second_start)?,
            Some(panes.bottom(Side::Right, d.second_end)?),
        ),
        DiffKind::Add => (
            panes.bottom(Side::Left, d.first_end)?,
            None,
            panes.top(Side::Right, d.second_start)?,
            Some(panes.bottom(Side::Right, d.second_end)?),
        ),
        DiffKind::Delete => (
            panes.top(Side::Left, d.first_start)?,
            Some(panes.bottom(Side::Left, d.first_end)?),
            panes.bottom(Side::Right, d.second_end)?,
            None,
        ),
    };
    Ok(DecoratedDifference {
        difference: d.clone(),
        top_left,
        bottom_left,
        top_right,
        bottom_right,
        can_rollback: can_rollback(d, panes.right, guarded),
        flood_fill: d.kind == DiffKind::Change,
    })
}

/// Decorate every difference, failing on the first unresolved line.
pub fn try_compute_decorations(
    diffs: &[Difference],
    panes: &PaneSources<'_>,
    guarded: &dyn GuardedBlocks,
) -> Result<Vec<DecoratedDifference>, GeometryError> {
    diffs
        .iter()
        .map(|d| decorate_one(d, panes, guarded))
        .collect()
}

/// Decorate every difference; an unavailable line anywhere yields an empty vector.
pub fn compute_decorations(
    diffs: &[Difference],
    panes: &PaneSources<'_>,
    guarded: &dyn GuardedBlocks,
) -> Vec<DecoratedDifference> {
    match try_compute_decorations(diffs, panes, guarded) {
        Ok(decorations) => decorations,
        Err(e) => {
            debug!(
                target: "align.decorate",
                error = %e,
                differences = diffs.len(),
                "decorations_degraded"
            );
            Vec::new()
        }
    }
}
