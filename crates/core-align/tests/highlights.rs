mod common;

use common::{FailingProvider, LINE_HEIGHT, snapshot};
use core_align::{
    HighLight, HighlightFlags, HighlightKind, HighlightOptions, NoGuardedBlocks, PaneSources,
    UniformLineGeometry, compute_decorations, highlights_for_side,
};
use core_diff::{DiffProvider, Difference, DocumentLines, LineDiffProvider, LineRange, Side};
use proptest::prelude::*;

fn highlight_both(
    left: &str,
    right: &str,
    diffs: &[Difference],
    provider: &dyn DiffProvider,
) -> (Vec<HighLight>, Vec<HighLight>, usize) {
    let (l, r) = (snapshot(left), snapshot(right));
    let g = UniformLineGeometry::new(l.clone(), r.clone(), LINE_HEIGHT);
    let panes = PaneSources::new(l.as_ref(), r.as_ref(), &g);
    let decorations = compute_decorations(diffs, &panes, &NoGuardedBlocks);
    let opts = HighlightOptions::default();
    let lh = highlights_for_side(&decorations, Side::Left, l.as_ref(), provider, opts, &|| false)
        .expect("left");
    let rh = highlights_for_side(&decorations, Side::Right, r.as_ref(), provider, opts, &|| false)
        .expect("right");
    (lh.items, rh.items, lh.word_diff_failures + rh.word_diff_failures)
}

#[test]
fn single_word_change_covers_whole_line() {
    let left = "one\ntwo\nfoo\nfour\n";
    let right = "one\ntwo\nbar\nfour\n";
    let diffs = [Difference::change(LineRange::new(3, 3), LineRange::new(3, 3), "foo", "bar")];
    let (l, r, failures) = highlight_both(left, right, &diffs, &LineDiffProvider::new());
    assert_eq!(failures, 0);
    assert_eq!(l.len(), 1);
    assert_eq!(r.len(), 1);
    // line 3 starts after "one\ntwo\n"
    assert_eq!((l[0].start, l[0].end), (8, 11));
    assert_eq!((r[0].start, r[0].end), (8, 11));
    assert_eq!(l[0].attributes.kind, HighlightKind::Changed);
    assert_eq!(r[0].attributes.flags, HighlightFlags::INTRA_LINE);
}

#[test]
fn word_diff_failure_drops_only_fine_highlights() {
    let left = "a b\nkeep\n";
    let right = "a c\nkeep\nnew\n";
    let diffs = [
        Difference::change(LineRange::new(1, 1), LineRange::new(1, 1), "a b\n", "a c\n"),
        Difference::add(2, 3, 3, "new\n"),
    ];
    let (l, r, failures) = highlight_both(left, right, &diffs, &FailingProvider);
    assert_eq!(failures, 2);
    assert!(l.is_empty());
    // the added line still gets its whole-line marker
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].attributes.kind, HighlightKind::Added);
    assert!(r[0].attributes.flags.contains(HighlightFlags::EXTENDS_EOL));
    assert_eq!((r[0].start, r[0].end), (9, 13));
}

fn span_of(diff: &Difference, side: Side, doc: &dyn DocumentLines) -> (usize, usize) {
    let range = diff.range(side);
    let start = doc
        .line_start_offset(range.start.saturating_sub(1))
        .unwrap_or(doc.len());
    let end = doc.line_start_offset(range.end).unwrap_or(doc.len());
    (start, end)
}

const WORDS: [&str; 6] = ["alpha", "beta", "x", "(y)", "a.b", "  "];

fn doc(lines: &[Vec<u8>]) -> String {
    lines
        .iter()
        .map(|words| {
            let mut line = words.iter().map(|w| WORDS[*w as usize]).collect::<Vec<_>>().join(" ");
            line.push('\n');
            line
        })
        .collect()
}

fn lines_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..6, 0..5), 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn highlights_stay_inside_their_difference(
        left in lines_strategy(),
        right in lines_strategy(),
    ) {
        let (left, right) = (doc(&left), doc(&right));
        let provider = LineDiffProvider::new();
        let diffs = provider.compute_diff(&left, &right).expect("diff");
        let (lh, rh, _) = highlight_both(&left, &right, &diffs, &provider);
        let (ld, rd) = (snapshot(&left), snapshot(&right));
        let sides = [(Side::Left, &lh, ld.as_ref()), (Side::Right, &rh, rd.as_ref())];
        for (side, items, doc) in sides {
            for h in items.iter() {
                prop_assert!(h.start < h.end);
                let owned = diffs
                    .iter()
                    .filter(|d| d.is_visible_on(side))
                    .map(|d| span_of(d, side, doc))
                    .any(|(s, e)| s <= h.start && h.end <= e);
                prop_assert!(owned, "{:?} highlight {:?} outside every difference", side, h);
            }
        }
    }
}
