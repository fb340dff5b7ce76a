// Domain rules - Timeline arithmetic and editing policies

use serde::{Deserialize, Serialize};

use crate::domain::errors::*;
use crate::domain::model::*;

/// Default distance within which a committed point is pulled onto a snap target
pub const DEFAULT_SNAP_RADIUS_S: f64 = 0.18;

/// Floating-point slack used when comparing times
const TIME_EPSILON: f64 = 1e-6;

/// What a committed point snapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapTarget {
    Grid,
    SegmentEdge,
    Marker,
}

/// Result of snapping a raw time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapOutcome {
    pub value: f64,
    pub target: Option<SnapTarget>,
}

impl SnapOutcome {
    pub fn snapped(&self) -> bool {
        self.target.is_some()
    }
}

/// Snap candidates for one draft state: one-second grid ticks, every segment
/// boundary and every marker (in source time).
#[derive(Debug, Clone)]
pub struct SnapIndex {
    duration_s: f64,
    radius_s: f64,
    points: Vec<(f64, SnapTarget)>,
}

impl SnapIndex {
    /// Collect candidates from the draft's current segments and markers
    pub fn build(draft: &Draft, radius_s: f64) -> Self {
        let mut points = Vec::new();
        for segment in draft.segments.values() {
            points.push((segment.start_s, SnapTarget::SegmentEdge));
            points.push((segment.end_s, SnapTarget::SegmentEdge));
            for marker in &segment.markers {
                points.push((segment.marker_time(marker), SnapTarget::Marker));
            }
        }
        Self::from_points(draft.asset.duration_s, radius_s, points)
    }

    /// Build an index from explicit edge/marker points
    pub fn from_points(duration_s: f64, radius_s: f64, mut points: Vec<(f64, SnapTarget)>) -> Self {
        let duration_s = finite_or_zero(duration_s).max(0.0);
        points.retain(|(t, _)| t.is_finite() && *t >= 0.0 && *t <= duration_s + TIME_EPSILON);
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            duration_s,
            radius_s: finite_or_zero(radius_s).max(0.0),
            points,
        }
    }

    /// Snap `raw` to the nearest candidate within the radius.
    ///
    /// The raw value is first clamped to the asset. On an exact distance tie
    /// the earlier time wins. Snapping a snapped value returns it unchanged.
    pub fn snap(&self, raw: f64) -> SnapOutcome {
        let clamped = clamp_to_duration(raw, self.duration_s);
        let mut best: Option<(f64, f64, SnapTarget)> = None;

        let mut consider = |value: f64, target: SnapTarget| {
            let distance = (value - clamped).abs();
            if distance > self.radius_s + TIME_EPSILON {
                return;
            }
            let better = match best {
                None => true,
                Some((best_distance, best_value, _)) => {
                    distance < best_distance - 1e-12
                        || ((distance - best_distance).abs() <= 1e-12 && value < best_value)
                }
            };
            if better {
                best = Some((distance, value, target));
            }
        };

        let last_tick = self.duration_s.floor();
        for tick in [clamped.floor(), clamped.ceil()] {
            if tick <= last_tick {
                consider(tick, SnapTarget::Grid);
            }
        }
        for &(value, target) in &self.points {
            consider(value, target);
        }

        match best {
            Some((_, value, target)) => SnapOutcome {
                value,
                target: Some(target),
            },
            None => SnapOutcome {
                value: clamped,
                target: None,
            },
        }
    }

    pub fn radius_s(&self) -> f64 {
        self.radius_s
    }
}

/// Validate a candidate In/Out pair
pub fn validate_in_out(in_s: f64, out_s: f64) -> EditResult<()> {
    if out_s <= in_s {
        return Err(EditError::InvalidRange { in_s, out_s });
    }
    Ok(())
}

/// Validate that an In/Out pair is long enough to become a segment
pub fn validate_new_segment(in_s: f64, out_s: f64) -> EditResult<()> {
    validate_in_out(in_s, out_s)?;
    let len_s = out_s - in_s;
    if len_s < MIN_SEGMENT_S - TIME_EPSILON {
        return Err(EditError::RangeTooShort {
            len_s,
            min_s: MIN_SEGMENT_S,
        });
    }
    Ok(())
}

/// New bounds of a segment that ripples left by `shift_s`.
///
/// Start never goes below zero and the end stays at least
/// [`MIN_SEGMENT_S`] after the start.
pub fn ripple_shift(start_s: f64, end_s: f64, shift_s: f64) -> (f64, f64) {
    let new_start = (start_s - shift_s).max(0.0);
    let new_end = (end_s - shift_s).max(new_start + MIN_SEGMENT_S);
    (new_start, new_end)
}

/// Where markers go when a segment is split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSplitPolicy {
    /// Every marker stays on the first half
    #[default]
    KeepOnFirst,
    /// Markers at or after the split point move to the second half
    MoveToSecond,
}

/// Check a split point and return the two ranges it produces
pub fn split_ranges(segment: &Segment, at_s: f64) -> EditResult<((f64, f64), (f64, f64))> {
    if !segment.contains_with_margin(at_s, MIN_SEGMENT_S) {
        return Err(EditError::SplitOutOfBounds {
            at_s,
            min_s: MIN_SEGMENT_S,
        });
    }
    Ok(((segment.start_s, at_s), (at_s, segment.end_s)))
}

/// Divide a segment's markers between the two halves of a split.
///
/// Offsets of moved markers are rebased onto the second half.
pub fn partition_markers(
    markers: Vec<Marker>,
    split_offset_s: f64,
    policy: MarkerSplitPolicy,
) -> (Vec<Marker>, Vec<Marker>) {
    match policy {
        MarkerSplitPolicy::KeepOnFirst => (markers, Vec::new()),
        MarkerSplitPolicy::MoveToSecond => {
            let (first, mut second): (Vec<_>, Vec<_>) = markers
                .into_iter()
                .partition(|m| m.offset_s < split_offset_s - TIME_EPSILON);
            for marker in &mut second {
                marker.offset_s = (marker.offset_s - split_offset_s).max(0.0);
            }
            (first, second)
        }
    }
}

/// How two segments adjacent in order relate in source time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contiguity {
    Contiguous,
    Gap(f64),
    Overlap(f64),
}

pub fn contiguity(first: &Segment, second: &Segment) -> Contiguity {
    let delta = second.start_s - first.end_s;
    if delta.abs() <= TIME_EPSILON {
        Contiguity::Contiguous
    } else if delta > 0.0 {
        Contiguity::Gap(delta)
    } else {
        Contiguity::Overlap(-delta)
    }
}

/// Merge `second` into `first`: the end becomes the later of the two ends and
/// the successor's markers are appended, rebased so they keep their source
/// time.
pub fn merge_into(first: &mut Segment, second: Segment) {
    let rebase = second.start_s - first.start_s;
    first.end_s = first.end_s.max(second.end_s);
    let length = first.duration_s();
    first.markers.extend(second.markers.into_iter().map(|mut m| {
        m.offset_s = (m.offset_s + rebase).clamp(0.0, length);
        m
    }));
}

/// Next preset after `current`, wrapping around.
///
/// A speed that is not a preset advances from the nearest preset.
pub fn next_speed(current: f64) -> f64 {
    let nearest = SPEED_PRESETS
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - current).abs().total_cmp(&(b.1 - current).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    SPEED_PRESETS[(nearest + 1) % SPEED_PRESETS.len()]
}
