#![allow(dead_code)]

use core_align::{LineGeometry, PixelRect, UniformLineGeometry};
use core_diff::{
    DiffError, DiffProvider, Difference, DocumentLines, LineDiffProvider, Side, TextSnapshot,
};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

pub const LINE_HEIGHT: u32 = 10;

pub fn numbered(n: usize) -> String {
    (1..=n).map(|i| format!("line{i}\n")).collect()
}

pub fn snapshot(text: &str) -> Arc<dyn DocumentLines> {
    Arc::new(TextSnapshot::new(text))
}

/// Uniform geometry that can pretend one line of one pane is not laid out.
pub struct ToggleGeometry {
    inner: UniformLineGeometry,
    unavailable: Cell<Option<(Side, u32)>>,
}

impl ToggleGeometry {
    pub fn new(left: Arc<dyn DocumentLines>, right: Arc<dyn DocumentLines>) -> Self {
        Self {
            inner: UniformLineGeometry::new(left, right, LINE_HEIGHT),
            unavailable: Cell::new(None),
        }
    }

    /// Make 0-based `line` of `side` unavailable (or everything available).
    pub fn set_unavailable(&self, target: Option<(Side, u32)>) {
        self.unavailable.set(target);
    }
}

impl LineGeometry for ToggleGeometry {
    fn rect_for_offset(&self, side: Side, offset: usize) -> Option<PixelRect> {
        let rect = self.inner.rect_for_offset(side, offset)?;
        match self.unavailable.get() {
            Some((s, line)) if s == side && rect.y / LINE_HEIGHT == line => None,
            _ => Some(rect),
        }
    }

    fn content_height(&self, side: Side) -> u32 {
        self.inner.content_height(side)
    }
}

/// Line differ that can be held inside `compute_diff` until released.
pub struct GatedProvider {
    inner: LineDiffProvider,
    gated: AtomicBool,
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct Gate {
    pub entered: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    pub fn wait_entered(&self) -> bool {
        self.entered.recv_timeout(Duration::from_secs(5)).is_ok()
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl GatedProvider {
    pub fn new() -> (Arc<Self>, Gate) {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let provider = Arc::new(Self {
            inner: LineDiffProvider::new(),
            gated: AtomicBool::new(false),
            entered: entered_tx,
            release: release_rx,
        });
        (
            provider,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }
}

impl DiffProvider for GatedProvider {
    fn compute_diff(&self, first: &str, second: &str) -> Result<Vec<Difference>, DiffError> {
        if self.gated.load(Ordering::SeqCst) {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
        }
        self.inner.compute_diff(first, second)
    }
}

/// Provider whose word-level diffs always fail.
pub struct FailingProvider;

impl DiffProvider for FailingProvider {
    fn compute_diff(&self, _first: &str, _second: &str) -> Result<Vec<Difference>, DiffError> {
        Err(DiffError::Io(std::io::Error::other("diff backend unavailable")))
    }
}

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

/// Run `f` under a debug-level subscriber and return what it logged.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.lock().expect("log buffer poisoned").clone();
    String::from_utf8(bytes).expect("utf8 log output")
}
