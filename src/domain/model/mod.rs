// Domain models - Core types and data structures

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod seconds;

/// Shortest segment the editor will create or leave behind
pub const MIN_SEGMENT_S: f64 = 0.1;

/// Playback-speed presets, in cycling order
pub const SPEED_PRESETS: [f64; 4] = [0.5, 1.0, 1.25, 2.0];

/// Default playback speed
pub const DEFAULT_SPEED: f64 = 1.0;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

entity_id!(
    /// Identity of a source recording
    AssetId
);
entity_id!(
    /// Identity of a trim segment
    SegmentId
);
entity_id!(
    /// Identity of a point annotation
    MarkerId
);
entity_id!(
    /// Identity of a timeline
    TimelineId
);
entity_id!(
    /// Identity of a draft, also its storage key
    DraftId
);

/// Clamp a time value to a finite, non-negative number of seconds
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Clamp `value` into `[0, duration]`, mapping non-finite input to 0
pub fn clamp_to_duration(value: f64, duration: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, duration.max(0.0))
}

/// Which derived resource of an asset a pipeline stage produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedField {
    Proxy,
    ThumbnailSprite,
    Waveform,
}

impl fmt::Display for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivedField::Proxy => "proxy",
            DerivedField::ThumbnailSprite => "thumbnail_sprite",
            DerivedField::Waveform => "waveform",
        };
        f.write_str(name)
    }
}

/// A reference to one source recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub source_uri: String,
    #[serde(with = "seconds")]
    pub duration_s: f64,
    #[serde(with = "seconds", default)]
    pub frame_rate: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub proxy_uri: Option<String>,
    #[serde(default)]
    pub thumbnail_sprite_uri: Option<String>,
    #[serde(default)]
    pub waveform_uri: Option<String>,
}

impl MediaAsset {
    /// Create a new asset; non-finite or negative durations are clamped to 0
    pub fn new(source_uri: impl Into<String>, duration_s: f64, frame_rate: f64) -> Self {
        Self {
            id: AssetId::new(),
            source_uri: source_uri.into(),
            duration_s: finite_or_zero(duration_s).max(0.0),
            frame_rate: finite_or_zero(frame_rate).max(0.0),
            created_at: Utc::now(),
            proxy_uri: None,
            thumbnail_sprite_uri: None,
            waveform_uri: None,
        }
    }

    /// Current value of a derived-resource field
    pub fn derived(&self, field: DerivedField) -> Option<&str> {
        match field {
            DerivedField::Proxy => self.proxy_uri.as_deref(),
            DerivedField::ThumbnailSprite => self.thumbnail_sprite_uri.as_deref(),
            DerivedField::Waveform => self.waveform_uri.as_deref(),
        }
    }

    /// Record a derived resource; a later write replaces an earlier one
    pub fn set_derived(&mut self, field: DerivedField, uri: String) {
        let slot = match field {
            DerivedField::Proxy => &mut self.proxy_uri,
            DerivedField::ThumbnailSprite => &mut self.thumbnail_sprite_uri,
            DerivedField::Waveform => &mut self.waveform_uri,
        };
        *slot = Some(uri);
    }

    /// Location to play back: the proxy when available, the original otherwise
    pub fn playback_uri(&self) -> &str {
        self.proxy_uri.as_deref().unwrap_or(&self.source_uri)
    }

    fn sanitize(&mut self) {
        self.duration_s = finite_or_zero(self.duration_s).max(0.0);
        self.frame_rate = finite_or_zero(self.frame_rate).max(0.0);
    }
}

/// A point annotation, positioned relative to its segment's start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    #[serde(with = "seconds")]
    pub offset_s: f64,
    pub label: String,
}

impl Marker {
    pub fn new(offset_s: f64, label: impl Into<String>) -> Self {
        Self {
            id: MarkerId::new(),
            offset_s: finite_or_zero(offset_s).max(0.0),
            label: label.into(),
        }
    }
}

/// A non-destructive range reference into the source asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub asset_id: AssetId,
    #[serde(with = "seconds")]
    pub start_s: f64,
    #[serde(with = "seconds")]
    pub end_s: f64,
    #[serde(with = "seconds", default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

impl Segment {
    /// Create a segment over `[start_s, end_s]` of `asset`, clamped to the
    /// asset's duration. Returns `None` if the clamped range is shorter
    /// than [`MIN_SEGMENT_S`].
    pub fn new(asset: &MediaAsset, start_s: f64, end_s: f64, label: impl Into<String>) -> Option<Self> {
        let start_s = clamp_to_duration(start_s, asset.duration_s);
        let end_s = clamp_to_duration(end_s, asset.duration_s);
        if end_s - start_s < MIN_SEGMENT_S - 1e-9 {
            return None;
        }
        Some(Self {
            id: SegmentId::new(),
            asset_id: asset.id.clone(),
            start_s,
            end_s,
            speed: DEFAULT_SPEED,
            label: label.into(),
            markers: Vec::new(),
        })
    }

    /// Length in source seconds
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }

    /// Length when played at the segment's speed
    pub fn playback_duration_s(&self) -> f64 {
        if self.speed > 0.0 {
            self.duration_s() / self.speed
        } else {
            self.duration_s()
        }
    }

    /// Whether `at_s` lies inside the segment with at least `margin_s` to spare on each side
    pub fn contains_with_margin(&self, at_s: f64, margin_s: f64) -> bool {
        at_s >= self.start_s + margin_s - 1e-9 && at_s <= self.end_s - margin_s + 1e-9
    }

    /// Absolute (source-timeline) position of a marker
    pub fn marker_time(&self, marker: &Marker) -> f64 {
        self.start_s + marker.offset_s
    }

    /// Clamp times into `[0, duration_s]`; returns false when no valid
    /// range of [`MIN_SEGMENT_S`] fits.
    fn sanitize(&mut self, duration_s: f64) -> bool {
        if duration_s < MIN_SEGMENT_S {
            return false;
        }
        self.start_s = clamp_to_duration(self.start_s, duration_s);
        self.end_s = clamp_to_duration(self.end_s, duration_s);
        if self.end_s - self.start_s < MIN_SEGMENT_S - 1e-9 {
            self.end_s = (self.start_s + MIN_SEGMENT_S).min(duration_s);
            self.start_s = (self.end_s - MIN_SEGMENT_S).max(0.0);
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            self.speed = DEFAULT_SPEED;
        }
        for marker in &mut self.markers {
            marker.offset_s = finite_or_zero(marker.offset_s).max(0.0);
        }
        true
    }
}

/// The ordering contract for a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: TimelineId,
    pub title: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub segment_order: Vec<SegmentId>,
}

impl Timeline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TimelineId::new(),
            title: title.into(),
            difficulty: String::new(),
            segment_order: Vec::new(),
        }
    }

    /// Position of a segment in playback order
    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.segment_order.iter().position(|s| s == id)
    }
}

/// Editor-only state stored with a draft but never part of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransientUiState {
    #[serde(with = "seconds", default)]
    pub playhead_s: f64,
    #[serde(with = "seconds", default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub selected_segment: Option<SegmentId>,
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for TransientUiState {
    fn default() -> Self {
        Self {
            playhead_s: 0.0,
            zoom: default_zoom(),
            selected_segment: None,
        }
    }
}

/// The aggregate root: one asset, its segments, and their order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub asset: MediaAsset,
    #[serde(default)]
    pub segments: HashMap<SegmentId, Segment>,
    pub timeline: Timeline,
    #[serde(default)]
    pub ui: TransientUiState,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Start a new, empty draft over `asset`
    pub fn new(asset: MediaAsset, title: impl Into<String>) -> Self {
        Self {
            id: DraftId::new(),
            asset,
            segments: HashMap::new(),
            timeline: Timeline::new(title),
            ui: TransientUiState::default(),
            updated_at: Utc::now(),
        }
    }

    /// Segments in playback order; ids missing from the map are skipped
    pub fn ordered_segments(&self) -> impl Iterator<Item = &Segment> {
        self.timeline
            .segment_order
            .iter()
            .filter_map(|id| self.segments.get(id))
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn selected(&self) -> Option<&Segment> {
        self.ui
            .selected_segment
            .as_ref()
            .and_then(|id| self.segments.get(id))
    }

    /// Sum of playback durations across the ordered segments
    pub fn total_playback_s(&self) -> f64 {
        self.ordered_segments().map(Segment::playback_duration_s).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Restore every invariant a stored or hand-built draft may have lost:
    /// finite clamped times, unique order ids that all exist in the map,
    /// no orphan segments, and a selection that points at a live segment.
    pub fn sanitize(&mut self) {
        self.asset.sanitize();
        let duration = self.asset.duration_s;

        self.segments.retain(|_, segment| segment.sanitize(duration));

        let mut seen = std::collections::HashSet::new();
        let segments = &self.segments;
        self.timeline
            .segment_order
            .retain(|id| segments.contains_key(id) && seen.insert(id.clone()));
        self.segments.retain(|id, _| seen.contains(id));

        self.ui.playhead_s = clamp_to_duration(self.ui.playhead_s, duration);
        self.ui.zoom = finite_or_zero(self.ui.zoom);
        if self.ui.zoom <= 0.0 {
            self.ui.zoom = default_zoom();
        }
        if let Some(selected) = &self.ui.selected_segment {
            if !self.segments.contains_key(selected) {
                self.ui.selected_segment = None;
            }
        }
    }

    /// Check the structural invariants without modifying anything
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for id in &self.timeline.segment_order {
            if !seen.insert(id) {
                return Err(format!("duplicate segment id {} in order", id));
            }
            if !self.segments.contains_key(id) {
                return Err(format!("segment {} in order but not in map", id));
            }
        }
        for segment in self.segments.values() {
            if segment.end_s - segment.start_s < MIN_SEGMENT_S - 1e-9 {
                return Err(format!("segment {} shorter than minimum", segment.id));
            }
            if segment.start_s < 0.0 || segment.end_s > self.asset.duration_s + 1e-9 {
                return Err(format!("segment {} outside asset bounds", segment.id));
            }
        }
        Ok(())
    }
}

/// One undo/redo unit: a full snapshot of the draft at a point in time
#[derive(Debug, Clone)]
pub struct DraftDelta {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub snapshot: Draft,
}

impl DraftDelta {
    pub fn capture(description: impl Into<String>, draft: &Draft) -> Self {
        Self {
            timestamp: Utc::now(),
            description: description.into(),
            snapshot: draft.clone(),
        }
    }
}

/// Technical description of a source file as reported by a probe
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub duration_s: f64,
    pub frame_rate: f64,
    pub has_video: bool,
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
}

impl MediaProbe {
    /// Height of a tile of `tile_width` that keeps the source aspect ratio
    pub fn scaled_height(&self, tile_width: u32) -> u32 {
        if self.width == 0 || self.height == 0 {
            return (tile_width * 9 / 16).max(1);
        }
        ((self.height as f64 * tile_width as f64 / self.width as f64).round() as u32).max(1)
    }
}

#[cfg(test)]
mod tests;
