//! Background highlight worker.
//!
//! One named thread per view. Jobs arrive over a bounded channel; when
//! several are queued only the newest is computed. A job is abandoned as soon
//! as its cancel token fires or the serial watermark moves past its serial,
//! in which case nothing is sent back. Publication is not decided here: the
//! view applies an outcome only if its serial is still current.

use crate::decorator::DecoratedDifference;
use crate::highlight::{CancelToken, HighLight, HighlightOptions, highlights_for_side};
use crate::metrics::AlignMetrics;
use core_diff::{DiffProvider, DocumentLines, Side};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

const JOB_QUEUE_CAPACITY: usize = 4;
const THREAD_NAME: &str = "oxidiff-highlight";

/// Called on the worker thread after an outcome has been sent.
pub type HighlightNotifier = Box<dyn Fn(u64) + Send>;

pub struct HighlightJob {
    pub serial: u64,
    pub decorations: Arc<[DecoratedDifference]>,
    pub left: Arc<dyn DocumentLines>,
    pub right: Arc<dyn DocumentLines>,
    pub options: HighlightOptions,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOutcome {
    pub serial: u64,
    pub left: Vec<HighLight>,
    pub right: Vec<HighLight>,
    pub word_diff_failures: usize,
}

pub struct HighlightWorker {
    jobs: Option<Sender<HighlightJob>>,
    outcomes: Receiver<HighlightOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl HighlightWorker {
    pub fn spawn(
        provider: Arc<dyn DiffProvider>,
        watermark: Arc<AtomicU64>,
        notify: Option<HighlightNotifier>,
        metrics: Arc<AlignMetrics>,
    ) -> io::Result<Self> {
        let (job_tx, job_rx) = bounded::<HighlightJob>(JOB_QUEUE_CAPACITY);
        let (out_tx, out_rx) = unbounded::<HighlightOutcome>();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run(job_rx, out_tx, provider, watermark, notify, metrics))?;
        Ok(Self {
            jobs: Some(job_tx),
            outcomes: out_rx,
            handle: Some(handle),
        })
    }

    /// Queue a job. A full queue hands the job back so the caller can cancel
    /// the backlog and retry.
    pub fn submit(&self, job: HighlightJob) -> Result<(), HighlightJob> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(job);
        };
        match jobs.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => Err(job),
        }
    }

    /// All outcomes received so far, oldest first.
    pub fn drain(&self) -> Vec<HighlightOutcome> {
        self.outcomes.try_iter().collect()
    }

    /// Wait up to `timeout` for the next outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HighlightOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}

impl Drop for HighlightWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            debug!(target: "align.worker", "worker_panicked");
        }
    }
}

fn run(
    jobs: Receiver<HighlightJob>,
    outcomes: Sender<HighlightOutcome>,
    provider: Arc<dyn DiffProvider>,
    watermark: Arc<AtomicU64>,
    notify: Option<HighlightNotifier>,
    metrics: Arc<AlignMetrics>,
) {
    debug!(target: "align.worker", "worker_started");
    while let Ok(mut job) = jobs.recv() {
        // Superseded jobs never start.
        for newer in jobs.try_iter() {
            job.cancel.cancel();
            metrics.incr_jobs_cancelled();
            job = newer;
        }
        let serial = job.serial;
        let Some(outcome) = compute(&job, provider.as_ref(), &watermark) else {
            trace!(target: "align.worker", serial, "job_abandoned");
            metrics.incr_jobs_cancelled();
            continue;
        };
        metrics.add_word_diff_failures(outcome.word_diff_failures);
        if outcomes.send(outcome).is_err() {
            break;
        }
        if let Some(notify) = notify.as_ref() {
            notify(serial);
        }
    }
    debug!(target: "align.worker", "worker_stopped");
}

fn compute(
    job: &HighlightJob,
    provider: &dyn DiffProvider,
    watermark: &AtomicU64,
) -> Option<HighlightOutcome> {
    let should_stop =
        || job.cancel.is_cancelled() || watermark.load(Ordering::Acquire) != job.serial;
    if should_stop() {
        return None;
    }
    let left = highlights_for_side(
        &job.decorations,
        Side::Left,
        job.left.as_ref(),
        provider,
        job.options,
        &should_stop,
    )?;
    let right = highlights_for_side(
        &job.decorations,
        Side::Right,
        job.right.as_ref(),
        provider,
        job.options,
        &should_stop,
    )?;
    if should_stop() {
        return None;
    }
    Some(HighlightOutcome {
        serial: job.serial,
        left: left.items,
        right: right.items,
        word_diff_failures: left.word_diff_failures + right.word_diff_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_diff::{Difference, LineDiffProvider, LineRange, TextSnapshot};
    use std::sync::mpsc;

    fn job(serial: u64) -> HighlightJob {
        let left: Arc<dyn DocumentLines> = Arc::new(TextSnapshot::new("foo\n"));
        let right: Arc<dyn DocumentLines> = Arc::new(TextSnapshot::new("bar\n"));
        let decorations: Arc<[DecoratedDifference]> = Arc::from(vec![DecoratedDifference {
            difference: Difference::change(
                LineRange::new(1, 1),
                LineRange::new(1, 1),
                "foo\n",
                "bar\n",
            ),
            top_left: 0,
            bottom_left: Some(16),
            top_right: 0,
            bottom_right: Some(16),
            can_rollback: true,
            flood_fill: true,
        }]);
        HighlightJob {
            serial,
            decorations,
            left,
            right,
            options: HighlightOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    fn worker(
        watermark: Arc<AtomicU64>,
        notify: Option<HighlightNotifier>,
    ) -> (HighlightWorker, Arc<AlignMetrics>) {
        let metrics = Arc::new(AlignMetrics::default());
        let provider = Arc::new(LineDiffProvider::new());
        let w = HighlightWorker::spawn(provider, watermark, notify, metrics.clone())
            .expect("spawn worker");
        (w, metrics)
    }

    #[test]
    fn computes_current_job_and_notifies() {
        let watermark = Arc::new(AtomicU64::new(3));
        let (tx, rx) = mpsc::channel();
        let notify: HighlightNotifier = Box::new(move |serial| {
            let _ = tx.send(serial);
        });
        let (w, metrics) = worker(watermark, Some(notify));
        assert!(w.submit(job(3)).is_ok());
        let outcome = w.recv_timeout(Duration::from_secs(5)).expect("outcome");
        assert_eq!(outcome.serial, 3);
        assert_eq!(outcome.left.len(), 1);
        assert_eq!(outcome.right.len(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(3));
        assert_eq!(metrics.snapshot().highlight_jobs_cancelled, 0);
    }

    #[test]
    fn stale_or_cancelled_jobs_send_nothing() {
        let watermark = Arc::new(AtomicU64::new(7));
        let (w, metrics) = worker(watermark, None);
        let cancelled = job(7);
        cancelled.cancel.cancel();
        assert!(w.submit(cancelled).is_ok());
        assert!(w.submit(job(6)).is_ok());
        assert!(w.submit(job(7)).is_ok());
        let outcome = w.recv_timeout(Duration::from_secs(5)).expect("outcome");
        assert_eq!(outcome.serial, 7);
        drop(w);
        assert!(metrics.snapshot().highlight_jobs_cancelled >= 2);
    }
}
