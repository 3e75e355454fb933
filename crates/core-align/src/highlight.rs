//! Intra-line highlight computation.
//!
//! Produces background spans in document byte offsets, one independent set
//! per side. Pure except for calls into the diff provider; safe to run off
//! the UI thread.
//!
//! For a `Change` whose two sides have the same number of lines, each line
//! pair is tokenized, re-joined one token per line and re-diffed with the
//! same provider used for the primary diff. Sub-differences map back to byte
//! spans inside the original line. Anything else (unbalanced changes, pure
//! adds and deletes, or intra-line highlighting switched off) gets a single
//! whole-line span flagged `EXTENDS_EOL`.
//!
//! Cancellation is cooperative: `should_stop` is polled before each
//! decoration and a stopped pass returns `None`, leaving the caller's cached
//! set untouched.

use crate::decorator::DecoratedDifference;
use bitflags::bitflags;
use core_diff::{DiffKind, DiffProvider, Difference, DocumentLines, Side};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Single-character delimiters besides whitespace.
const DELIMITERS: &str = ".,;:(){}[]<>!@#$%^&*-+=/?\\|'\"`~";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HighlightFlags: u8 {
        /// Paint to the right edge of the pane, past the last character.
        const EXTENDS_EOL = 0b0000_0001;
        /// Span produced by word-level re-diffing.
        const INTRA_LINE = 0b0000_0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKind {
    Added,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HighlightAttributes {
    pub kind: HighlightKind,
    pub flags: HighlightFlags,
}

/// Background span `[start, end)` in document byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighLight {
    pub start: usize,
    pub end: usize,
    pub attributes: HighlightAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightOptions {
    pub intra_line: bool,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self { intra_line: true }
    }
}

/// Shared cancellation flag for one highlight pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Highlights for one side plus the number of word pairs whose re-diff failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideHighlights {
    pub items: Vec<HighLight>,
    pub word_diff_failures: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || DELIMITERS.contains(c)
}

/// Split into maximal non-delimiter runs and single delimiter characters.
pub fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if is_delimiter(c) {
            if let Some(start) = run_start.take() {
                tokens.push(&line[start..i]);
            }
            tokens.push(&line[i..i + c.len_utf8()]);
        } else if run_start.is_none() {
            run_start = Some(i);
        }
    }
    if let Some(start) = run_start {
        tokens.push(&line[start..]);
    }
    tokens
}

/// One token per line, each terminated by `\n`.
fn words_document(tokens: &[&str]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.len() + 1).sum());
    for token in tokens {
        // Newline tokens cannot occur: lines arrive without terminators.
        out.push_str(token);
        out.push('\n');
    }
    out
}

/// Byte offset within the line where 0-based token `index` starts
/// (`index == tokens.len()` gives the line length).
fn token_offset(tokens: &[&str], index: usize) -> usize {
    tokens[..index.min(tokens.len())].iter().map(|t| t.len()).sum()
}

fn highlight_kind(kind: DiffKind) -> HighlightKind {
    match kind {
        DiffKind::Change => HighlightKind::Changed,
        DiffKind::Add => HighlightKind::Added,
        DiffKind::Delete => HighlightKind::Deleted,
    }
}

fn whole_lines(difference: &Difference, side: Side, doc: &dyn DocumentLines) -> Option<HighLight> {
    let range = difference.range(side);
    if range.is_empty() {
        return None;
    }
    let start = doc.line_start_offset(range.start.checked_sub(1)?)?;
    let end = doc.line_start_offset(range.end).unwrap_or(doc.len());
    Some(HighLight {
        start,
        end: end.max(start),
        attributes: HighlightAttributes {
            kind: highlight_kind(difference.kind),
            flags: HighlightFlags::EXTENDS_EOL,
        },
    })
}

/// Word-level spans for one line pair, appended to `out`. Returns `false`
/// when the provider failed for this pair.
fn line_pair(
    first: &str,
    second: &str,
    side: Side,
    line_start: usize,
    provider: &dyn DiffProvider,
    out: &mut Vec<HighLight>,
) -> bool {
    if first == second {
        return true;
    }
    let first_tokens = tokenize(first);
    let second_tokens = tokenize(second);
    let first_words = words_document(&first_tokens);
    let second_words = words_document(&second_tokens);
    let subs = match provider.compute_diff(&first_words, &second_words) {
        Ok(subs) => subs,
        Err(e) => {
            debug!(target: "align.highlight", error = %e, "word_diff_failed");
            return false;
        }
    };
    let tokens = match side {
        Side::Left => &first_tokens,
        Side::Right => &second_tokens,
    };
    for sub in &subs {
        match (side, sub.kind) {
            (Side::Left, DiffKind::Add) | (Side::Right, DiffKind::Delete) => continue,
            _ => {}
        }
        let range = sub.range(side);
        let Some(first_token) = range.start.checked_sub(1) else {
            continue;
        };
        if range.is_empty() {
            continue;
        }
        let start = token_offset(tokens, first_token);
        let end = token_offset(tokens, range.end);
        if end <= start {
            continue;
        }
        out.push(HighLight {
            start: line_start + start,
            end: line_start + end,
            attributes: HighlightAttributes {
                kind: highlight_kind(sub.kind),
                flags: HighlightFlags::INTRA_LINE,
            },
        });
    }
    true
}

/// Fine spans for a balanced change, or `None` when the line texts carried by
/// the difference do not match its ranges (fall back to whole lines).
fn balanced_change(
    difference: &Difference,
    side: Side,
    doc: &dyn DocumentLines,
    provider: &dyn DiffProvider,
    out: &mut Vec<HighLight>,
    failures: &mut usize,
) -> Option<()> {
    let first: Vec<&str> = difference.first_text.lines().collect();
    let second: Vec<&str> = difference.second_text.lines().collect();
    let count = difference.first_line_count();
    if first.len() != count || second.len() != count {
        return None;
    }
    let base_line = difference.range(side).start.checked_sub(1)?;
    for (i, (a, b)) in first.iter().zip(second.iter()).enumerate() {
        // Lines that vanished from the snapshot are simply skipped.
        let Some(line_start) = doc.line_start_offset(base_line + i) else {
            continue;
        };
        if !line_pair(a, b, side, line_start, provider, out) {
            *failures += 1;
        }
    }
    Some(())
}

/// Compute all highlights for `side`. Returns `None` if `should_stop`
/// reported true before the pass finished.
pub fn highlights_for_side(
    decorations: &[DecoratedDifference],
    side: Side,
    doc: &dyn DocumentLines,
    provider: &dyn DiffProvider,
    options: HighlightOptions,
    should_stop: &dyn Fn() -> bool,
) -> Option<SideHighlights> {
    let mut out = SideHighlights::default();
    for decoration in decorations {
        if should_stop() {
            return None;
        }
        let difference = &decoration.difference;
        if !difference.is_visible_on(side) {
            continue;
        }
        if options.intra_line
            && difference.is_balanced_change()
            && balanced_change(
                difference,
                side,
                doc,
                provider,
                &mut out.items,
                &mut out.word_diff_failures,
            )
            .is_some()
        {
            continue;
        }
        if let Some(h) = whole_lines(difference, side, doc) {
            out.items.push(h);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_diff::{DiffError, LineDiffProvider, LineRange, TextSnapshot};

    fn decorate(difference: Difference) -> DecoratedDifference {
        DecoratedDifference {
            difference,
            top_left: 0,
            bottom_left: None,
            top_right: 0,
            bottom_right: None,
            can_rollback: true,
            flood_fill: false,
        }
    }

    struct FailingProvider;

    impl DiffProvider for FailingProvider {
        fn compute_diff(&self, _: &str, _: &str) -> Result<Vec<Difference>, DiffError> {
            Err(DiffError::Rejected {
                reason: "offline".into(),
            })
        }
    }

    fn run(
        d: &DecoratedDifference,
        side: Side,
        doc: &TextSnapshot,
        provider: &dyn DiffProvider,
        options: HighlightOptions,
    ) -> SideHighlights {
        highlights_for_side(std::slice::from_ref(d), side, doc, provider, options, &|| false)
            .expect("not cancelled")
    }

    #[test]
    fn tokenizer_splits_runs_and_delimiters() {
        assert_eq!(
            tokenize("let x = foo(a, b);"),
            vec!["let", " ", "x", " ", "=", " ", "foo", "(", "a", ",", " ", "b", ")", ";"]
        );
        assert_eq!(tokenize("  "), vec![" ", " "]);
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("héllo wörld"), vec!["héllo", " ", "wörld"]);
    }

    #[test]
    fn words_document_one_token_per_line() {
        assert_eq!(words_document(&tokenize("a+b")), "a\n+\nb\n");
        assert_eq!(token_offset(&["ab", "+", "cd"], 2), 3);
        assert_eq!(token_offset(&["ab", "+", "cd"], 9), 5);
    }

    #[test]
    fn changed_word_maps_back_to_line_offsets() {
        let left = TextSnapshot::new("keep\nlet x = 1;\n");
        let right = TextSnapshot::new("keep\nlet y = 1;\n");
        let d = decorate(Difference::change(
            LineRange::new(2, 2),
            LineRange::new(2, 2),
            "let x = 1;\n",
            "let y = 1;\n",
        ));
        let provider = LineDiffProvider::new();
        let l = run(&d, Side::Left, &left, &provider, HighlightOptions::default());
        let r = run(&d, Side::Right, &right, &provider, HighlightOptions::default());
        assert_eq!(l.items.len(), 1);
        // "keep\n" is 5 bytes, "x" sits at column 4
        assert_eq!((l.items[0].start, l.items[0].end), (9, 10));
        assert_eq!((r.items[0].start, r.items[0].end), (9, 10));
        assert_eq!(l.items[0].attributes.flags, HighlightFlags::INTRA_LINE);
    }

    #[test]
    fn inserted_word_only_highlights_added_side() {
        let left = TextSnapshot::new("a b\n");
        let right = TextSnapshot::new("a new b\n");
        let d = decorate(Difference::change(
            LineRange::new(1, 1),
            LineRange::new(1, 1),
            "a b\n",
            "a new b\n",
        ));
        let provider = LineDiffProvider::new();
        let l = run(&d, Side::Left, &left, &provider, HighlightOptions::default());
        let r = run(&d, Side::Right, &right, &provider, HighlightOptions::default());
        assert!(l.items.is_empty());
        assert_eq!(r.items.len(), 1);
        assert_eq!(r.items[0].attributes.kind, HighlightKind::Added);
        let span = &"a new b"[r.items[0].start..r.items[0].end];
        assert!(span.contains("new"));
    }

    #[test]
    fn unbalanced_change_uses_whole_lines() {
        let right = TextSnapshot::new("x\ny\nz\n");
        let d = decorate(Difference::change(
            LineRange::new(1, 1),
            LineRange::new(1, 2),
            "a\n",
            "x\ny\n",
        ));
        let provider = LineDiffProvider::new();
        let out = run(&d, Side::Right, &right, &provider, HighlightOptions::default());
        assert_eq!(out.items.len(), 1);
        assert_eq!((out.items[0].start, out.items[0].end), (0, 4));
        assert!(out.items[0].attributes.flags.contains(HighlightFlags::EXTENDS_EOL));
    }

    #[test]
    fn add_is_invisible_on_left() {
        let left = TextSnapshot::new("a\n");
        let right = TextSnapshot::new("a\nb\n");
        let d = decorate(Difference::add(1, 2, 2, "b\n"));
        let provider = LineDiffProvider::new();
        let l = run(&d, Side::Left, &left, &provider, HighlightOptions::default());
        let r = run(&d, Side::Right, &right, &provider, HighlightOptions::default());
        assert!(l.items.is_empty());
        assert_eq!((r.items[0].start, r.items[0].end), (2, 4));
        assert_eq!(r.items[0].attributes.kind, HighlightKind::Added);
    }

    #[test]
    fn provider_failure_skips_pair_only() {
        let left = TextSnapshot::new("a\nb\n");
        let d = decorate(Difference::change(
            LineRange::new(1, 2),
            LineRange::new(1, 2),
            "a\nb\n",
            "c\nb\n",
        ));
        let out = run(&d, Side::Left, &left, &FailingProvider, HighlightOptions::default());
        assert!(out.items.is_empty());
        // identical second pair never reaches the provider
        assert_eq!(out.word_diff_failures, 1);
    }

    #[test]
    fn intra_line_disabled_falls_back() {
        let left = TextSnapshot::new("foo\n");
        let d = decorate(Difference::change(
            LineRange::new(1, 1),
            LineRange::new(1, 1),
            "foo\n",
            "bar\n",
        ));
        let options = HighlightOptions { intra_line: false };
        let out = run(&d, Side::Left, &left, &LineDiffProvider::new(), options);
        assert_eq!(out.items[0].attributes.flags, HighlightFlags::EXTENDS_EOL);
    }

    #[test]
    fn zero_based_range_from_provider_is_skipped() {
        let doc = TextSnapshot::new("a\nb\n");
        let provider = LineDiffProvider::new();
        let malformed = [
            Difference::change(LineRange::new(0, 0), LineRange::new(0, 0), "a\n", "b\n"),
            Difference::change(LineRange::new(0, 1), LineRange::new(0, 0), "a\n", "b\nc\n"),
        ];
        for difference in malformed {
            let d = decorate(difference);
            for options in [HighlightOptions::default(), HighlightOptions { intra_line: false }] {
                assert!(run(&d, Side::Left, &doc, &provider, options).items.is_empty());
                assert!(run(&d, Side::Right, &doc, &provider, options).items.is_empty());
            }
        }
    }

    #[test]
    fn stop_signal_abandons_pass() {
        let left = TextSnapshot::new("foo\n");
        let d = decorate(Difference::change(
            LineRange::new(1, 1),
            LineRange::new(1, 1),
            "foo\n",
            "bar\n",
        ));
        let token = CancelToken::new();
        token.cancel();
        let stop = || token.is_cancelled();
        let provider = LineDiffProvider::new();
        let options = HighlightOptions::default();
        assert!(highlights_for_side(&[d], Side::Left, &left, &provider, options, &stop).is_none());
    }
}
