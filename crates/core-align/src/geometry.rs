//! Line geometry and guarded-block seams.
//!
//! `LineGeometry` is implemented by the rendering layer and is UI-affine: it
//! is only ever called from the thread that owns the view (no `Send` bound).
//! `rect_for_offset` returning `None` means the pane is not laid out yet.
//!
//! `UniformLineGeometry` is a complete adapter for fixed line height panes
//! (monospace terminals, the CLI harness, tests).

use core_diff::{DocumentLines, Side};
use std::ops::Range;
use std::sync::Arc;

/// Vertical pixel extent of one rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub y: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(y: u32, height: u32) -> Self {
        Self { y, height }
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// Total scrollable pixel height of each pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaneHeights {
    pub left: u32,
    pub right: u32,
}

impl PaneHeights {
    pub fn new(left: u32, right: u32) -> Self {
        Self { left, right }
    }

    pub fn of(geometry: &dyn LineGeometry) -> Self {
        Self {
            left: geometry.content_height(Side::Left),
            right: geometry.content_height(Side::Right),
        }
    }
}

pub trait LineGeometry {
    /// Pixel rect of the line containing byte `offset` in `side`'s document,
    /// or `None` when layout is not available.
    fn rect_for_offset(&self, side: Side, offset: usize) -> Option<PixelRect>;
    /// Full scrollable height of the pane, including any padding below the
    /// last line.
    fn content_height(&self, side: Side) -> u32;
}

/// Read-only regions of the right buffer that block rollback.
pub trait GuardedBlocks {
    fn has_guarded_blocks(&self) -> bool;
    /// Whether `[start, end)` touches a guarded block. `start == end` tests a
    /// single position.
    fn overlaps_guarded_block(&self, start: usize, end: usize) -> bool;
}

/// Buffer without guarded regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGuardedBlocks;

impl GuardedBlocks for NoGuardedBlocks {
    fn has_guarded_blocks(&self) -> bool {
        false
    }

    fn overlaps_guarded_block(&self, _start: usize, _end: usize) -> bool {
        false
    }
}

/// Guarded blocks as explicit byte ranges.
#[derive(Debug, Clone, Default)]
pub struct GuardedRanges {
    ranges: Vec<Range<usize>>,
}

impl GuardedRanges {
    pub fn new(ranges: Vec<Range<usize>>) -> Self {
        Self { ranges }
    }
}

impl GuardedBlocks for GuardedRanges {
    fn has_guarded_blocks(&self) -> bool {
        !self.ranges.is_empty()
    }

    fn overlaps_guarded_block(&self, start: usize, end: usize) -> bool {
        self.ranges.iter().any(|r| {
            if start == end {
                r.start <= start && start < r.end
            } else {
                start < r.end && r.start < end
            }
        })
    }
}

/// Fixed line height geometry over two document snapshots.
pub struct UniformLineGeometry {
    docs: [Arc<dyn DocumentLines>; 2],
    line_height: u32,
    padding: u32,
}

impl UniformLineGeometry {
    /// `padding` defaults to one line height so the last line's bottom edge
    /// stays inside the scrollable area.
    pub fn new(
        left: Arc<dyn DocumentLines>,
        right: Arc<dyn DocumentLines>,
        line_height: u32,
    ) -> Self {
        let line_height = line_height.max(1);
        Self {
            docs: [left, right],
            line_height,
            padding: line_height,
        }
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    fn line_of_offset(doc: &dyn DocumentLines, offset: usize) -> Option<usize> {
        if offset > doc.len() {
            return None;
        }
        // Last line whose start is <= offset; a trailing newline start maps to line_count.
        let (mut lo, mut hi) = (0usize, doc.line_count());
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            match doc.line_start_offset(mid) {
                Some(start) if start <= offset => lo = mid,
                _ => hi = mid - 1,
            }
        }
        Some(lo)
    }
}

impl LineGeometry for UniformLineGeometry {
    fn rect_for_offset(&self, side: Side, offset: usize) -> Option<PixelRect> {
        let doc = self.docs[side.index()].as_ref();
        let line = Self::line_of_offset(doc, offset)?;
        let y = u32::try_from(line).ok()?.checked_mul(self.line_height)?;
        Some(PixelRect::new(y, self.line_height))
    }

    fn content_height(&self, side: Side) -> u32 {
        let lines = u32::try_from(self.docs[side.index()].line_count()).unwrap_or(u32::MAX);
        lines.saturating_mul(self.line_height).saturating_add(self.padding)
    }
}
