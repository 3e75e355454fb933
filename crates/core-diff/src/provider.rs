//! Diff provider seam and the default line differ.
//!
//! The engine calls a `DiffProvider` twice over: once for the primary
//! line-level diff of the two buffers and again, per changed line pair, over
//! word-per-line pseudo documents built by the intra-line highlighter. The
//! provider is therefore text-agnostic: it diffs lines split on `\n`.
//!
//! Failures are surfaced as `DiffError` and absorbed by callers (the primary
//! diff degrades to "no differences", a word pair degrades to "no fine
//! highlight").

use crate::{Difference, LineRange};
use similar::{Algorithm, DiffOp};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("diff input could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("diff provider rejected input: {reason}")]
    Rejected { reason: String },
}

pub trait DiffProvider: Send + Sync {
    /// Compute differences between `first` (left) and `second` (right),
    /// ordered by position, with 1-based inclusive line numbers.
    fn compute_diff(&self, first: &str, second: &str) -> Result<Vec<Difference>, DiffError>;
}

/// Default provider: `similar` over lines with terminators stripped.
#[derive(Debug, Clone)]
pub struct LineDiffProvider {
    algorithm: Algorithm,
    deadline: Option<Duration>,
}

impl Default for LineDiffProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDiffProvider {
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::Myers,
            deadline: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Bound the time spent per diff; past the deadline `similar` falls back
    /// to a coarser (still valid) result.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

impl DiffProvider for LineDiffProvider {
    fn compute_diff(&self, first: &str, second: &str) -> Result<Vec<Difference>, DiffError> {
        let old = split_lines(first);
        let new = split_lines(second);
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let ops = similar::capture_diff_slices_deadline(self.algorithm, &old, &new, deadline);

        let mut out: Vec<Difference> = Vec::new();
        for op in ops {
            let next = match op {
                DiffOp::Equal { .. } => continue,
                DiffOp::Delete {
                    old_index,
                    old_len,
                    new_index,
                } => Difference::delete(
                    old_index + 1,
                    old_index + old_len,
                    new_index,
                    join_lines(&old[old_index..old_index + old_len]),
                ),
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => Difference::add(
                    old_index,
                    new_index + 1,
                    new_index + new_len,
                    join_lines(&new[new_index..new_index + new_len]),
                ),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => Difference::change(
                    LineRange::new(old_index + 1, old_index + old_len),
                    LineRange::new(new_index + 1, new_index + new_len),
                    join_lines(&old[old_index..old_index + old_len]),
                    join_lines(&new[new_index..new_index + new_len]),
                ),
            };
            push_merged(&mut out, next);
        }
        trace!(
            target: "diff.provider",
            lines_first = old.len(),
            lines_second = new.len(),
            differences = out.len(),
            "diff_computed"
        );
        Ok(out)
    }
}

/// Fold a `Delete` immediately followed by an `Add` at the same spot into a
/// single `Change`.
fn push_merged(out: &mut Vec<Difference>, next: Difference) {
    use crate::DiffKind;
    if let Some(prev) = out.last_mut()
        && prev.kind == DiffKind::Delete
        && next.kind == DiffKind::Add
        && next.first_end == prev.first_end
        && next.second_start == prev.second_start
    {
        prev.kind = DiffKind::Change;
        prev.second_end = next.second_end;
        prev.second_text = next.second_text;
        return;
    }
    out.push(next);
}
