//! ox-diff entrypoint: align two files with a fixed line height geometry and
//! print decorations, highlights and sampled follow positions.
use anyhow::{Context, Result};
use clap::Parser;
use core_align::{
    DecoratedDifference, DiffView, FollowDirection, HighLight, HighlightFlags, HighlightKind,
    LineGeometry, NoGuardedBlocks, ScrollDirection, UniformLineGeometry,
};
use core_config::{ColorConfig, Config, load_from};
use core_diff::{DiffKind, DocumentLines, LineDiffProvider, Side, TextSnapshot};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const HIGHLIGHT_WAIT: Duration = Duration::from_secs(10);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ox-diff", version, about = "Two-pane diff alignment report")]
struct Args {
    /// Left (original) file.
    pub left: PathBuf,
    /// Right (modified) file.
    pub right: PathBuf,
    /// Optional configuration file path (overrides discovery of `oxidiff.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Rendered line height in pixels.
    #[arg(long = "line-height", default_value_t = 16)]
    pub line_height: u32,
    /// Visible pane height in pixels.
    #[arg(long = "viewport", default_value_t = 600)]
    pub viewport: u32,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self) -> Result<()> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let args = Args::parse();
        let left = read_input(&args.left)?;
        let right = read_input(&args.right)?;
        let mut config = load_from(args.config.clone())?;
        config.apply_line_height(args.line_height);

        let report = align(&config, &left, &right, args.line_height, args.viewport)?;
        let mut out = std::io::stdout().lock();
        out.write_all(report.as_bytes())?;
        out.flush()?;
        info!(target: "runtime", "shutdown");
        Ok(())
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("oxidiff.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "oxidiff.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn read_input(path: &Path) -> Result<String> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    info!(target: "runtime", path = %path.display(), size_bytes = content.len(), "input_loaded");
    Ok(content)
}

fn kind_label(kind: DiffKind) -> &'static str {
    match kind {
        DiffKind::Add => "add",
        DiffKind::Delete => "delete",
        DiffKind::Change => "change",
    }
}

fn pixel_span(top: u32, bottom: Option<u32>) -> String {
    match bottom {
        Some(bottom) => format!("{top}..{bottom}"),
        None => format!("@{top}"),
    }
}

fn line_span(d: &DecoratedDifference, side: Side) -> String {
    let range = d.difference.range(side);
    if range.is_empty() {
        format!("after {}", range.end)
    } else {
        format!("{}..{}", range.start, range.end)
    }
}

fn write_decorations(out: &mut String, decorations: &[DecoratedDifference]) {
    let _ = writeln!(out, "differences: {}", decorations.len());
    for (i, d) in decorations.iter().enumerate() {
        let _ = writeln!(
            out,
            "  #{i} {:<6} L {:<10} R {:<10} left {:<12} right {:<12}{}",
            kind_label(d.kind()),
            line_span(d, Side::Left),
            line_span(d, Side::Right),
            pixel_span(d.top_left, d.bottom_left),
            pixel_span(d.top_right, d.bottom_right),
            if d.can_rollback { "" } else { " guarded" },
        );
    }
}

fn write_highlights(out: &mut String, side: Side, items: &[HighLight], colors: &ColorConfig) {
    let label = match side {
        Side::Left => "left",
        Side::Right => "right",
    };
    let _ = writeln!(out, "highlights {label}: {}", items.len());
    for h in items {
        let (kind, color) = match h.attributes.kind {
            HighlightKind::Added => ("added", colors.added),
            HighlightKind::Changed => ("changed", colors.changed),
            HighlightKind::Deleted => ("deleted", colors.deleted),
        };
        let extent = if h.attributes.flags.contains(HighlightFlags::EXTENDS_EOL) {
            " eol"
        } else {
            ""
        };
        let _ = writeln!(out, "  [{}, {}) {kind} {color}{extent}", h.start, h.end);
    }
}

/// Run the engine over two texts and render the report.
fn align(
    config: &Config,
    left: &str,
    right: &str,
    line_height: u32,
    viewport: u32,
) -> Result<String> {
    let view = DiffView::new(config, Arc::new(LineDiffProvider::new()))?;
    let l: Arc<dyn DocumentLines> = Arc::new(TextSnapshot::new(left));
    let r: Arc<dyn DocumentLines> = Arc::new(TextSnapshot::new(right));
    view.set_documents(l.clone(), r.clone());
    if let Err(e) = view.refresh_diff(left, right) {
        warn!(target: "runtime", error = %e, "diff_failed");
    }
    let geometry = UniformLineGeometry::new(l.clone(), r.clone(), line_height);
    let guarded = NoGuardedBlocks;

    let decorations = view.decorations(&geometry, &guarded);
    if !view.wait_for_highlights(HIGHLIGHT_WAIT) {
        warn!(target: "runtime", "highlights_not_ready");
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "left: {} lines, {}px | right: {} lines, {}px",
        l.line_count(),
        geometry.content_height(Side::Left),
        r.line_count(),
        geometry.content_height(Side::Right),
    );
    write_decorations(&mut out, &decorations);
    write_highlights(&mut out, Side::Left, &view.highlights(Side::Left), config.colors());
    write_highlights(&mut out, Side::Right, &view.highlights(Side::Right), config.colors());

    let right_height = geometry.content_height(Side::Right);
    let step = (viewport / 2).max(1);
    let _ = writeln!(out, "scroll (viewport {viewport}px):");
    let mut offset = 0;
    while offset < right_height {
        let follow = view.follow_position(
            &geometry,
            &guarded,
            offset,
            viewport,
            viewport,
            FollowDirection::RightDrivesLeft,
        );
        let current = view
            .update_current_difference(&geometry, &guarded, offset, viewport, ScrollDirection::Down)
            .map_or_else(|| "-".to_string(), |i| format!("#{i}"));
        let _ = writeln!(out, "  right {offset:>6} -> left {follow:>6}  current {current}");
        offset += step;
    }

    let m = view.metrics();
    info!(
        target: "runtime",
        decorations = m.decorations_computed,
        scroll_maps = m.scroll_maps_built,
        scroll_map_hits = m.scroll_map_cache_hits,
        jobs_published = m.highlight_jobs_published,
        jobs_discarded = m.highlight_jobs_discarded,
        "alignment_metrics"
    );
    Ok(out)
}

fn main() -> Result<()> {
    let mut app = AppStartup::new();
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["ox-diff", "a.txt", "b.txt"]).expect("parse");
        assert_eq!(args.line_height, 16);
        assert_eq!(args.viewport, 600);
        assert!(args.config.is_none());
        let args = Args::try_parse_from([
            "ox-diff",
            "a",
            "b",
            "--line-height",
            "20",
            "--config",
            "x.toml",
        ])
        .expect("parse");
        assert_eq!(args.line_height, 20);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(Args::try_parse_from(["ox-diff", "only-one"]).is_err());
    }

    #[test]
    fn report_lists_decorations_and_highlights() {
        let report =
            align(&Config::default(), "a\nfoo\nc\n", "a\nbar\nc\nd\n", 16, 32).expect("report");
        assert!(report.starts_with("left: 3 lines, 64px | right: 4 lines, 80px\n"));
        assert!(report.contains("differences: 2\n"));
        assert!(report.contains("#0 change"));
        assert!(report.contains("#1 add"));
        assert!(report.contains("highlights left: 1\n"));
        assert!(report.contains("[2, 5) changed #a0c8ff\n"));
        assert!(report.contains("highlights right: 2\n"));
        assert!(report.contains("added #b4ffb4 eol"));
        assert!(report.contains("right      0 -> left      0"));
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let err = read_input(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("reading /definitely/not/here.txt"));
    }
}
