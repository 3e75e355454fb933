//! Scroll coupling between the panes.
//!
//! `follow_position` aligns the centre of the following pane with the centre
//! of the driving pane through the scroll map. The remaining helpers drive
//! difference navigation: which difference is "current" for a viewport, where
//! to scroll to reveal one, and proportional horizontal coupling.

use crate::decorator::DecoratedDifference;
use crate::scroll_map::ScrollMap;

/// Moving up, the current difference is the one after the last difference
/// lying wholly above this fraction of the viewport.
pub const CURRENT_DIFF_UPPER_THIRD: (u32, u32) = (1, 3);
/// Moving down, the current difference is the one before the first
/// difference starting below this fraction of the viewport.
pub const CURRENT_DIFF_LOWER_THIRDS: (u32, u32) = (2, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDirection {
    /// Right pane scrolled; map right rows to left rows.
    RightDrivesLeft,
    /// Left pane scrolled; map left rows back to right rows.
    LeftDrivesRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowRequest {
    pub driving_offset: u32,
    pub driving_extent: u32,
    pub following_extent: u32,
    pub direction: FollowDirection,
    pub snap_edges: bool,
}

fn fraction(value: u32, (num, den): (u32, u32)) -> u32 {
    (u64::from(value) * u64::from(num) / u64::from(den)) as u32
}

/// Following pane's top offset for `req`. An empty map couples 1:1.
pub fn follow_position(map: &ScrollMap, req: FollowRequest) -> u32 {
    let Some(last) = map.last_index() else {
        return req.driving_offset;
    };
    let right_height = u32::try_from(map.len()).unwrap_or(u32::MAX);
    let (driving_height, following_height) = match req.direction {
        FollowDirection::RightDrivesLeft => (right_height, map.left_height()),
        FollowDirection::LeftDrivesRight => (map.left_height(), right_height),
    };
    let following_max = following_height.saturating_sub(req.following_extent);

    if req.snap_edges {
        if req.driving_offset == 0 {
            return 0;
        }
        if req.driving_offset.saturating_add(req.driving_extent) >= driving_height {
            return following_max;
        }
    }

    let center = req.driving_offset.saturating_add(req.driving_extent / 2);
    let mapped = match req.direction {
        FollowDirection::RightDrivesLeft => {
            let row = (center as usize).min(last);
            map.get(row).unwrap_or(0)
        }
        FollowDirection::LeftDrivesRight => {
            let row = map.reverse_lookup(center).unwrap_or(0);
            u32::try_from(row).unwrap_or(u32::MAX)
        }
    };
    mapped
        .saturating_sub(req.following_extent / 2)
        .min(following_max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Unknown,
}

/// Index of the difference a viewport of the right pane is "on".
pub fn current_difference(
    decorations: &[DecoratedDifference],
    viewport_top: u32,
    viewport_height: u32,
    direction: ScrollDirection,
) -> Option<usize> {
    if decorations.is_empty() {
        return None;
    }
    let last = decorations.len() - 1;
    match direction {
        ScrollDirection::Up => {
            if viewport_top != 0 {
                let up = viewport_top
                    .saturating_add(fraction(viewport_height, CURRENT_DIFF_UPPER_THIRD));
                // A delete has no right bottom and counts as above.
                let above = |d: &DecoratedDifference| {
                    d.top_right < up && d.bottom_right.is_none_or(|b| b < up)
                };
                if let Some(i) = decorations.iter().rposition(above) {
                    return Some((i + 1).min(last));
                }
            }
            Some(0)
        }
        ScrollDirection::Down | ScrollDirection::Unknown => {
            let bottom =
                viewport_top.saturating_add(fraction(viewport_height, CURRENT_DIFF_LOWER_THIRDS));
            let below = |d: &DecoratedDifference| {
                d.top_right > bottom && d.bottom_right.is_none_or(|b| b > bottom)
            };
            match decorations.iter().position(below) {
                Some(i) => Some(i.saturating_sub(1)),
                None => Some(last),
            }
        }
    }
}

/// Right pane offset that shows `decoration` just above the viewport centre.
pub fn difference_scroll_target(decoration: &DecoratedDifference, viewport_height: u32) -> u32 {
    decoration.top_right.saturating_sub(viewport_height / 2 + 1)
}

/// Map a scroll value between two scrollbars of different ranges.
pub fn proportional_offset(
    value: u32,
    max_from: u32,
    extent_from: u32,
    max_to: u32,
    extent_to: u32,
) -> u32 {
    let range_from = u64::from(max_from.saturating_sub(extent_from));
    if range_from == 0 {
        return 0;
    }
    let range_to = u64::from(max_to.saturating_sub(extent_to));
    let scaled = u64::from(value.min(max_from)) * range_to / range_from;
    u32::try_from(scaled.min(range_to)).unwrap_or(u32::MAX)
}
