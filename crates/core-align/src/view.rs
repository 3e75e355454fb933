//! Per-view cache and invalidation controller.
//!
//! `DiffView` owns everything derived from the difference list: decorations,
//! the scroll map and both sides' highlights. All of it lives in one
//! `ViewState` behind a single mutex and is keyed by the diff serial.
//!
//! Per side the highlight state moves `Clean -> Dirty -> Recomputing ->
//! Clean`. A serial bump or a pane height change marks both sides dirty. The
//! next `decorations()` call recomputes decorations synchronously, clears the
//! cached highlights and hands a job to the background worker. Results come
//! back as `(serial, highlights)` and are applied by `apply_ready_highlights`
//! on the UI thread only if the serial is still current.
//!
//! Geometry is sampled only through the `&dyn LineGeometry` passed to each
//! call; the view never keeps a reference to the rendering layer.

use crate::decorator::{DecoratedDifference, PaneSources, try_compute_decorations};
use crate::error::AlignError;
use crate::geometry::{GuardedBlocks, LineGeometry, PaneHeights};
use crate::highlight::{CancelToken, HighLight, HighlightOptions};
use crate::metrics::{AlignMetrics, AlignMetricsSnapshot};
use crate::scroll_map::{ScrollMap, ScrollMapCache, build_scroll_map};
use crate::smart_scroll::{
    FollowDirection, FollowRequest, ScrollDirection, current_difference, difference_scroll_target,
    follow_position,
};
use crate::worker::{HighlightJob, HighlightNotifier, HighlightOutcome, HighlightWorker};
use core_config::Config;
use core_diff::{DiffError, DiffProvider, Difference, DocumentLines, Side, TextSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Clean,
    Dirty,
    Recomputing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewSettings {
    smart_scroll: bool,
    snap_edges: bool,
    smoothing_window: u32,
    highlight: HighlightOptions,
}

impl ViewSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            smart_scroll: config.smart_scroll(),
            snap_edges: config.snap_edges(),
            smoothing_window: config.effective_smoothing_window,
            highlight: HighlightOptions {
                intra_line: config.intra_line_highlights(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct HighlightSet {
    serial: u64,
    items: Arc<[HighLight]>,
}

impl HighlightSet {
    fn empty(serial: u64) -> Self {
        Self {
            serial,
            items: Arc::from(Vec::new()),
        }
    }
}

struct DecorationCache {
    serial: u64,
    heights: PaneHeights,
    items: Arc<[DecoratedDifference]>,
}

struct ViewState {
    serial: u64,
    differences: Arc<[Difference]>,
    left: Arc<dyn DocumentLines>,
    right: Arc<dyn DocumentLines>,
    decorations: Option<DecorationCache>,
    scroll_map: ScrollMapCache,
    highlights: [HighlightSet; 2],
    sides: [SideState; 2],
    in_flight: Option<CancelToken>,
    current_difference: Option<usize>,
    navigating: bool,
    smart_scroll_suppressed: u32,
    smoothing_window: u32,
}

impl ViewState {
    fn new(smoothing_window: u32) -> Self {
        let empty: Arc<dyn DocumentLines> = Arc::new(TextSnapshot::new(""));
        Self {
            serial: 0,
            differences: Arc::from(Vec::new()),
            left: empty.clone(),
            right: empty,
            decorations: None,
            scroll_map: ScrollMapCache::default(),
            highlights: [HighlightSet::empty(0), HighlightSet::empty(0)],
            sides: [SideState::Dirty, SideState::Dirty],
            in_flight: None,
            current_difference: None,
            navigating: false,
            smart_scroll_suppressed: 0,
            smoothing_window,
        }
    }

    fn mark_dirty(&mut self) {
        self.sides = [SideState::Dirty, SideState::Dirty];
    }
}

pub struct DiffView {
    state: Mutex<ViewState>,
    watermark: Arc<AtomicU64>,
    provider: Arc<dyn DiffProvider>,
    settings: ViewSettings,
    metrics: Arc<AlignMetrics>,
    worker: HighlightWorker,
}

impl DiffView {
    pub fn new(config: &Config, provider: Arc<dyn DiffProvider>) -> Result<Self, AlignError> {
        Self::build(config, provider, None)
    }

    /// Like `new`, with a callback run on the worker thread whenever an
    /// outcome is ready. Hosts use it to post a wakeup to their UI loop,
    /// which then calls `apply_ready_highlights`.
    pub fn with_notifier(
        config: &Config,
        provider: Arc<dyn DiffProvider>,
        notify: impl Fn(u64) + Send + 'static,
    ) -> Result<Self, AlignError> {
        Self::build(config, provider, Some(Box::new(notify)))
    }

    fn build(
        config: &Config,
        provider: Arc<dyn DiffProvider>,
        notify: Option<HighlightNotifier>,
    ) -> Result<Self, AlignError> {
        let settings = ViewSettings::from_config(config);
        let metrics = Arc::new(AlignMetrics::default());
        let watermark = Arc::new(AtomicU64::new(0));
        let worker =
            HighlightWorker::spawn(provider.clone(), watermark.clone(), notify, metrics.clone())?;
        debug!(
            target: "align.view",
            smart_scroll = settings.smart_scroll,
            smoothing_window = settings.smoothing_window,
            "view_created"
        );
        Ok(Self {
            state: Mutex::new(ViewState::new(settings.smoothing_window)),
            watermark,
            provider,
            settings,
            metrics,
            worker,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_locked(&self, state: &mut ViewState) -> u64 {
        state.serial += 1;
        self.watermark.store(state.serial, Ordering::Release);
        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
        state.mark_dirty();
        state.scroll_map.invalidate();
        trace!(target: "align.view", serial = state.serial, "serial_bumped");
        state.serial
    }

    /// Mark everything derived as stale. Called by the editing layer when
    /// text, differences or font metrics change.
    pub fn bump_serial(&self) -> u64 {
        let mut state = self.lock();
        self.bump_locked(&mut state)
    }

    pub fn serial(&self) -> u64 {
        self.lock().serial
    }

    pub fn set_documents(
        &self,
        left: Arc<dyn DocumentLines>,
        right: Arc<dyn DocumentLines>,
    ) -> u64 {
        let mut state = self.lock();
        state.left = left;
        state.right = right;
        self.bump_locked(&mut state)
    }

    pub fn set_differences(&self, differences: Vec<Difference>) -> u64 {
        let mut state = self.lock();
        state.differences = Arc::from(differences);
        state.current_difference = None;
        self.bump_locked(&mut state)
    }

    /// New delete smoothing window after a font metrics change.
    pub fn set_smoothing_window(&self, window: u32) -> u64 {
        let mut state = self.lock();
        state.smoothing_window = window;
        self.bump_locked(&mut state)
    }

    /// Font metrics changed: re-derive the smoothing window for the new line
    /// height. The serial is bumped even when the window stays the same.
    pub fn font_metrics_changed(&self, config: &mut Config, line_height: u32) -> u64 {
        match config.recompute_after_metrics_change(line_height) {
            Some(window) => self.set_smoothing_window(window),
            None => self.bump_serial(),
        }
    }

    /// Recompute the primary diff through the provider. A provider failure
    /// leaves the view with no differences.
    pub fn refresh_diff(&self, first: &str, second: &str) -> Result<usize, DiffError> {
        let result = self.provider.compute_diff(first, second);
        let (differences, outcome) = match result {
            Ok(differences) => {
                let n = differences.len();
                (differences, Ok(n))
            }
            Err(e) => {
                debug!(target: "diff.provider", error = %e, "primary_diff_failed");
                (Vec::new(), Err(e))
            }
        };
        self.set_differences(differences);
        outcome
    }

    pub fn differences(&self) -> Arc<[Difference]> {
        self.lock().differences.clone()
    }

    pub fn side_state(&self, side: Side) -> SideState {
        self.lock().sides[side.index()]
    }

    /// Current decorations, recomputed synchronously when the serial or the
    /// pane heights changed. Empty while geometry is unavailable.
    pub fn decorations(
        &self,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
    ) -> Arc<[DecoratedDifference]> {
        let mut state = self.lock();
        self.decorations_locked(&mut state, geometry, guarded).0
    }

    /// Returns the decorations and whether they are a degraded (empty) set.
    fn decorations_locked(
        &self,
        state: &mut ViewState,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
    ) -> (Arc<[DecoratedDifference]>, bool) {
        let heights = PaneHeights::of(geometry);
        if let Some(cache) = state.decorations.as_ref()
            && cache.serial == state.serial
            && cache.heights == heights
        {
            let items = cache.items.clone();
            if state.sides.contains(&SideState::Dirty) {
                self.schedule_highlights(state, items.clone());
            }
            return (items, false);
        }

        if state.decorations.as_ref().is_some_and(|c| c.heights != heights) {
            state.mark_dirty();
        }
        state.highlights = [
            HighlightSet::empty(state.serial),
            HighlightSet::empty(state.serial),
        ];

        let panes = PaneSources::new(state.left.as_ref(), state.right.as_ref(), geometry);
        match try_compute_decorations(&state.differences, &panes, guarded) {
            Ok(items) => {
                self.metrics.incr_decorations(false);
                let items: Arc<[DecoratedDifference]> = Arc::from(items);
                trace!(
                    target: "align.decorate",
                    serial = state.serial,
                    count = items.len(),
                    "decorations_computed"
                );
                state.decorations = Some(DecorationCache {
                    serial: state.serial,
                    heights,
                    items: items.clone(),
                });
                state.mark_dirty();
                self.schedule_highlights(state, items.clone());
                (items, false)
            }
            Err(e) => {
                self.metrics.incr_decorations(true);
                debug!(
                    target: "align.decorate",
                    error = %e,
                    serial = state.serial,
                    differences = state.differences.len(),
                    "decorations_degraded"
                );
                state.decorations = None;
                (Arc::from(Vec::new()), true)
            }
        }
    }

    fn schedule_highlights(&self, state: &mut ViewState, decorations: Arc<[DecoratedDifference]>) {
        if let Some(previous) = state.in_flight.take() {
            previous.cancel();
        }
        let cancel = CancelToken::new();
        let job = HighlightJob {
            serial: state.serial,
            decorations,
            left: state.left.clone(),
            right: state.right.clone(),
            options: self.settings.highlight,
            cancel: cancel.clone(),
        };
        match self.worker.submit(job) {
            Ok(()) => {
                self.metrics.incr_jobs_scheduled();
                state.in_flight = Some(cancel);
                state.sides = [SideState::Recomputing, SideState::Recomputing];
            }
            Err(job) => {
                // Sides stay dirty; the next decorations() call retries.
                job.cancel.cancel();
                debug!(target: "align.worker", serial = job.serial, "job_queue_full");
            }
        }
    }

    /// Cached highlights for `side`. Never blocks on the worker.
    pub fn highlights(&self, side: Side) -> Arc<[HighLight]> {
        self.lock().highlights[side.index()].items.clone()
    }

    /// Serial the cached highlights of `side` belong to.
    pub fn highlights_serial(&self, side: Side) -> u64 {
        self.lock().highlights[side.index()].serial
    }

    fn apply_outcome(&self, state: &mut ViewState, outcome: HighlightOutcome) -> bool {
        if outcome.serial != state.serial || !state.sides.contains(&SideState::Recomputing) {
            self.metrics.incr_jobs_discarded();
            trace!(
                target: "align.view",
                outcome_serial = outcome.serial,
                serial = state.serial,
                "stale_highlights_discarded"
            );
            return false;
        }
        self.metrics.incr_jobs_published();
        trace!(
            target: "align.view",
            serial = outcome.serial,
            left = outcome.left.len(),
            right = outcome.right.len(),
            "highlights_published"
        );
        state.highlights = [
            HighlightSet {
                serial: outcome.serial,
                items: Arc::from(outcome.left),
            },
            HighlightSet {
                serial: outcome.serial,
                items: Arc::from(outcome.right),
            },
        ];
        state.sides = [SideState::Clean, SideState::Clean];
        state.in_flight = None;
        true
    }

    /// Apply any outcome the worker has delivered. Returns whether the
    /// highlights changed.
    pub fn apply_ready_highlights(&self) -> bool {
        let outcomes = self.worker.drain();
        if outcomes.is_empty() {
            return false;
        }
        let mut state = self.lock();
        let mut applied = false;
        for outcome in outcomes {
            applied |= self.apply_outcome(&mut state, outcome);
        }
        applied
    }

    /// Block up to `timeout` until current highlights are published.
    pub fn wait_for_highlights(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lock().sides.iter().all(|s| *s == SideState::Clean) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let Some(outcome) = self.worker.recv_timeout(remaining) else {
                return false;
            };
            let mut state = self.lock();
            if self.apply_outcome(&mut state, outcome) {
                return true;
            }
        }
    }

    /// Scroll map for the current serial and pane heights.
    pub fn scroll_map(
        &self,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
    ) -> Arc<ScrollMap> {
        let mut state = self.lock();
        let heights = PaneHeights::of(geometry);
        if let Some(map) = state.scroll_map.lookup(state.serial, heights) {
            self.metrics.incr_scroll_map_hit();
            return map;
        }
        let (decorations, degraded) = self.decorations_locked(&mut state, geometry, guarded);
        let build = build_scroll_map(&decorations, heights, state.smoothing_window);
        self.metrics.incr_scroll_map_built(build.truncated.is_some());
        let map = Arc::new(build.map);
        // A map built from degraded or truncated input is not worth keeping.
        if !degraded && build.truncated.is_none() {
            let serial = state.serial;
            state.scroll_map.store(serial, heights, map.clone());
        }
        map
    }

    /// Offset for the following pane when the driving pane scrolled to
    /// `driving_offset`. Panes scroll 1:1 when smart scrolling is off or
    /// suppressed.
    pub fn follow_position(
        &self,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
        driving_offset: u32,
        driving_extent: u32,
        following_extent: u32,
        direction: FollowDirection,
    ) -> u32 {
        if !self.settings.smart_scroll || self.lock().smart_scroll_suppressed > 0 {
            return driving_offset;
        }
        let map = self.scroll_map(geometry, guarded);
        follow_position(
            &map,
            FollowRequest {
                driving_offset,
                driving_extent,
                following_extent,
                direction,
                snap_edges: self.settings.snap_edges,
            },
        )
    }

    /// Run `f` with smart scrolling suppressed (panes move 1:1).
    pub fn with_smart_scroll_disabled<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock().smart_scroll_suppressed += 1;
        let _suppressed = SmartScrollSuppression { view: self };
        f()
    }

    pub fn current_difference(&self) -> Option<usize> {
        self.lock().current_difference
    }

    /// Select difference `index` programmatically. Viewport-driven updates
    /// are ignored until `end_navigation`.
    pub fn set_current_difference(&self, index: usize) -> Result<(), AlignError> {
        let mut state = self.lock();
        let len = state.differences.len();
        if index >= len {
            return Err(AlignError::InvalidDifference { index, len });
        }
        state.current_difference = Some(index);
        state.navigating = true;
        Ok(())
    }

    /// Select difference `index` and return the right pane offset that
    /// reveals it, plus whether the caller should snap to the edges
    /// (first or last difference).
    pub fn navigate_to_difference(
        &self,
        index: usize,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
        viewport_height: u32,
    ) -> Result<Option<(u32, bool)>, AlignError> {
        self.set_current_difference(index)?;
        let decorations = self.decorations(geometry, guarded);
        let Some(decoration) = decorations.get(index) else {
            return Ok(None);
        };
        let snap = index == 0 || index + 1 == decorations.len();
        Ok(Some((difference_scroll_target(decoration, viewport_height), snap)))
    }

    pub fn end_navigation(&self) {
        self.lock().navigating = false;
    }

    /// Recompute the current difference from the right pane viewport. No-op
    /// during programmatic navigation.
    pub fn update_current_difference(
        &self,
        geometry: &dyn LineGeometry,
        guarded: &dyn GuardedBlocks,
        viewport_top: u32,
        viewport_height: u32,
        direction: ScrollDirection,
    ) -> Option<usize> {
        let mut state = self.lock();
        if state.navigating {
            return state.current_difference;
        }
        let (decorations, _) = self.decorations_locked(&mut state, geometry, guarded);
        let current = current_difference(&decorations, viewport_top, viewport_height, direction);
        state.current_difference = current;
        current
    }

    pub fn metrics(&self) -> AlignMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Lifts one level of smart scroll suppression on drop, unwinding included.
struct SmartScrollSuppression<'a> {
    view: &'a DiffView,
}

impl Drop for SmartScrollSuppression<'_> {
    fn drop(&mut self) {
        let mut state = self.view.lock();
        state.smart_scroll_suppressed = state.smart_scroll_suppressed.saturating_sub(1);
    }
}
