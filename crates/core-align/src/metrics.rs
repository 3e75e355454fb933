//! Alignment engine counters.
//!
//! Relaxed atomics, incremented from the UI thread and the highlight worker.
//! Read through `snapshot()`; tests assert on deltas between snapshots.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

#[derive(Debug, Default)]
pub struct AlignMetrics {
    decorations_computed: AtomicU64,
    decorations_degraded: AtomicU64,
    scroll_maps_built: AtomicU64,
    scroll_map_cache_hits: AtomicU64,
    scroll_map_aborts: AtomicU64,
    highlight_jobs_scheduled: AtomicU64,
    highlight_jobs_published: AtomicU64,
    highlight_jobs_discarded: AtomicU64,
    highlight_jobs_cancelled: AtomicU64,
    word_diff_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlignMetricsSnapshot {
    pub decorations_computed: u64,
    /// Decoration passes that degraded to empty (geometry unavailable).
    pub decorations_degraded: u64,
    pub scroll_maps_built: u64,
    pub scroll_map_cache_hits: u64,
    pub scroll_map_aborts: u64,
    pub highlight_jobs_scheduled: u64,
    pub highlight_jobs_published: u64,
    /// Outcomes that arrived for an outdated serial.
    pub highlight_jobs_discarded: u64,
    /// Jobs abandoned by the worker (cancel token or serial watermark).
    pub highlight_jobs_cancelled: u64,
    pub word_diff_failures: u64,
}

impl AlignMetrics {
    pub fn snapshot(&self) -> AlignMetricsSnapshot {
        AlignMetricsSnapshot {
            decorations_computed: self.decorations_computed.load(Relaxed),
            decorations_degraded: self.decorations_degraded.load(Relaxed),
            scroll_maps_built: self.scroll_maps_built.load(Relaxed),
            scroll_map_cache_hits: self.scroll_map_cache_hits.load(Relaxed),
            scroll_map_aborts: self.scroll_map_aborts.load(Relaxed),
            highlight_jobs_scheduled: self.highlight_jobs_scheduled.load(Relaxed),
            highlight_jobs_published: self.highlight_jobs_published.load(Relaxed),
            highlight_jobs_discarded: self.highlight_jobs_discarded.load(Relaxed),
            highlight_jobs_cancelled: self.highlight_jobs_cancelled.load(Relaxed),
            word_diff_failures: self.word_diff_failures.load(Relaxed),
        }
    }

    pub(crate) fn incr_decorations(&self, degraded: bool) {
        self.decorations_computed.fetch_add(1, Relaxed);
        if degraded {
            self.decorations_degraded.fetch_add(1, Relaxed);
        }
    }
    pub(crate) fn incr_scroll_map_built(&self, aborted: bool) {
        self.scroll_maps_built.fetch_add(1, Relaxed);
        if aborted {
            self.scroll_map_aborts.fetch_add(1, Relaxed);
        }
    }
    pub(crate) fn incr_scroll_map_hit(&self) {
        self.scroll_map_cache_hits.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_jobs_scheduled(&self) {
        self.highlight_jobs_scheduled.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_jobs_published(&self) {
        self.highlight_jobs_published.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_jobs_discarded(&self) {
        self.highlight_jobs_discarded.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_jobs_cancelled(&self) {
        self.highlight_jobs_cancelled.fetch_add(1, Relaxed);
    }
    pub(crate) fn add_word_diff_failures(&self, n: usize) {
        if n > 0 {
            self.word_diff_failures.fetch_add(n as u64, Relaxed);
        }
    }
}
