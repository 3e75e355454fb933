//! Difference model shared by the alignment engine and its collaborators.
//!
//! A `Difference` describes one contiguous changed region between the left
//! buffer (A, "first") and the right buffer (B, "second"). Line numbers are
//! 1-based and inclusive, exactly as emitted by the diff provider.
//!
//! Invariants:
//! * `Add`: no lines consumed on the left, `first_end == first_start - 1`
//!   (the insertion point sits after line `first_end` of A).
//! * `Delete`: mirror of `Add` on the right, `second_end == second_start - 1`.
//! * `Change`: both ranges non-empty.
//!
//! Records are immutable once produced; a new diff pass produces a new vector.

pub mod document;
pub mod provider;

pub use document::{DocumentLines, TextSnapshot};
pub use provider::{DiffError, DiffProvider, LineDiffProvider};

/// One of the two compared panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Buffer A (base / first).
    Left,
    /// Buffer B (modified / second).
    Right,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffKind {
    Add,
    Delete,
    Change,
}

/// 1-based inclusive line range on one side. `end == start - 1` denotes an
/// empty range (insertion point).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of lines covered (0 for an insertion point).
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub kind: DiffKind,
    pub first_start: usize,
    pub first_end: usize,
    pub second_start: usize,
    pub second_end: usize,
    /// Text of the affected left lines, each terminated by `\n`. Empty for `Add`.
    pub first_text: String,
    /// Text of the affected right lines, each terminated by `\n`. Empty for `Delete`.
    pub second_text: String,
}

impl Difference {
    pub fn new(
        kind: DiffKind,
        first: LineRange,
        second: LineRange,
        first_text: impl Into<String>,
        second_text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            first_start: first.start,
            first_end: first.end,
            second_start: second.start,
            second_end: second.end,
            first_text: first_text.into(),
            second_text: second_text.into(),
        }
    }

    /// Lines `second_start..=second_end` inserted after left line `after`.
    pub fn add(
        after: usize,
        second_start: usize,
        second_end: usize,
        second_text: impl Into<String>,
    ) -> Self {
        Self::new(
            DiffKind::Add,
            LineRange::new(after + 1, after),
            LineRange::new(second_start, second_end),
            String::new(),
            second_text,
        )
    }

    /// Lines `first_start..=first_end` removed; on the right they would sit after line `after`.
    pub fn delete(
        first_start: usize,
        first_end: usize,
        after: usize,
        first_text: impl Into<String>,
    ) -> Self {
        Self::new(
            DiffKind::Delete,
            LineRange::new(first_start, first_end),
            LineRange::new(after + 1, after),
            first_text,
            String::new(),
        )
    }

    pub fn change(
        first: LineRange,
        second: LineRange,
        first_text: impl Into<String>,
        second_text: impl Into<String>,
    ) -> Self {
        Self::new(DiffKind::Change, first, second, first_text, second_text)
    }

    pub fn range(&self, side: Side) -> LineRange {
        match side {
            Side::Left => LineRange::new(self.first_start, self.first_end),
            Side::Right => LineRange::new(self.second_start, self.second_end),
        }
    }

    pub fn text(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.first_text,
            Side::Right => &self.second_text,
        }
    }

    pub fn first_line_count(&self) -> usize {
        self.range(Side::Left).len()
    }

    pub fn second_line_count(&self) -> usize {
        self.range(Side::Right).len()
    }

    /// A `Change` whose two sides cover the same number of lines, i.e. a
    /// sequence of 1:1 line pairs eligible for word-level highlighting.
    pub fn is_balanced_change(&self) -> bool {
        self.kind == DiffKind::Change
            && self.first_end.wrapping_sub(self.first_start)
                == self.second_end.wrapping_sub(self.second_start)
    }

    /// Whether the given side shows any lines for this difference.
    pub fn is_visible_on(&self, side: Side) -> bool {
        match (self.kind, side) {
            (DiffKind::Add, Side::Left) | (DiffKind::Delete, Side::Right) => false,
            (DiffKind::Add, Side::Right)
            | (DiffKind::Delete, Side::Left)
            | (DiffKind::Change, _) => true,
        }
    }
}

/// Find the difference covering 1-based `line` on `side`.
///
/// Differences must be sorted by position. On the left an `Add` is matched at
/// its insertion point (`line == first_start`); on the right a `Delete` is
/// matched the same way.
pub fn difference_at_line(diffs: &[Difference], side: Side, line: usize) -> Option<&Difference> {
    for difference in diffs {
        let range = difference.range(side);
        if line < range.start {
            return None;
        }
        let insertion_kind = match side {
            Side::Left => DiffKind::Add,
            Side::Right => DiffKind::Delete,
        };
        if difference.kind == insertion_kind && line == range.start {
            return Some(difference);
        }
        if line <= range.end {
            return Some(difference);
        }
    }
    None
}
