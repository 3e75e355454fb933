use core_diff::Side;
use thiserror::Error;

/// Layout not ready for a queried line. Absorbed by the decorator, which
/// degrades to an empty decoration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("no line {line} in {side:?} document")]
    LineNotFound { side: Side, line: usize },
    #[error("geometry unavailable for line {line} in {side:?} pane")]
    Unavailable { side: Side, line: usize },
}

/// Transient skew between decorations and the destination map (diffing
/// against an outdated layout). The builder stops walking and keeps what it
/// has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScrollMapError {
    #[error("decoration pixel {index} outside scroll map of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("failed to spawn highlight worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    #[error("illegal difference number {index} (have {len})")]
    InvalidDifference { index: usize, len: usize },
}
