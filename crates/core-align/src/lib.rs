//! Two-pane alignment engine: decorations, scroll map, intra-line highlights.
//!
//! Given the differences between a left and a right buffer and the pixel
//! geometry of both panes, the engine produces plain data for the rendering
//! layer. It never renders, edits buffers or holds a reference back into the
//! UI.
//!
//! Pipeline:
//! 1. `decorator`: each `Difference` becomes a `DecoratedDifference` with
//!    pixel anchors in both panes. All-or-nothing: one unresolved line yields
//!    an empty set.
//! 2. `scroll_map`: right-row -> left-row correspondence built from the
//!    decorations, with deletions smoothed over a configurable window.
//! 3. `highlight`: background spans per side; balanced changes are re-diffed
//!    word by word through the same `DiffProvider`.
//! 4. `view`: `DiffView` caches all of the above behind one mutex keyed by the
//!    diff serial, and runs highlights on a `worker` thread with serial-gated
//!    publication.
//! 5. `smart_scroll`: centre-aligned pane following plus difference
//!    navigation helpers.
//!
//! Invariants:
//! - `map[0] == 0` and `map[last] == height_left - 1` for every built map.
//! - The map is non-decreasing for ordered decorations.
//! - Highlights for serial N are never published once the serial moved past N.
//! - Geometry is only touched through the `&dyn LineGeometry` handed to each
//!   call, on the caller's thread.
//!
//! Degraded modes are absorbed locally and logged at debug: unavailable
//! geometry (empty decorations), an out-of-range anchor (truncated map), a
//! failing word diff (no fine highlight for that line pair), and stale
//! background results (discarded).

pub mod decorator;
pub mod error;
pub mod geometry;
pub mod highlight;
pub mod metrics;
pub mod scroll_map;
pub mod smart_scroll;
pub mod view;
pub mod worker;

pub use decorator::{
    DecoratedDifference, PaneSources, compute_decorations, try_compute_decorations,
};
pub use error::{AlignError, GeometryError, ScrollMapError};
pub use geometry::{
    GuardedBlocks, GuardedRanges, LineGeometry, NoGuardedBlocks, PaneHeights, PixelRect,
    UniformLineGeometry,
};
pub use highlight::{
    CancelToken, HighLight, HighlightAttributes, HighlightFlags, HighlightKind, HighlightOptions,
    SideHighlights, highlights_for_side, tokenize,
};
pub use metrics::{AlignMetrics, AlignMetricsSnapshot};
pub use scroll_map::{ScrollMap, ScrollMapBuild, ScrollMapCache, build_scroll_map, settle_point};
pub use smart_scroll::{
    FollowDirection, FollowRequest, ScrollDirection, current_difference, difference_scroll_target,
    follow_position, proportional_offset,
};
pub use view::{DiffView, SideState};
pub use worker::{HighlightJob, HighlightOutcome, HighlightWorker};
