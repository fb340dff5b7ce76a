// Domain use cases - Draft creation and the export view consumed downstream

use serde::Serialize;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Use case for starting a draft over a freshly imported recording
pub struct ImportDraftUseCase;

impl ImportDraftUseCase {
    /// Create a draft wrapping one asset described by `probe`
    pub fn execute(source_uri: &str, probe: &MediaProbe, title: &str) -> Result<Draft, DomainError> {
        if source_uri.trim().is_empty() {
            return Err(DomainError::BadArgs("Source location cannot be empty".to_string()));
        }
        if !probe.has_video && !probe.has_audio {
            return Err(DomainError::InvalidMedia(format!(
                "{} has neither a video nor an audio track",
                source_uri
            )));
        }

        let asset = MediaAsset::new(source_uri, probe.duration_s, probe.frame_rate);
        let title = if title.trim().is_empty() {
            default_title(source_uri)
        } else {
            title.trim().to_string()
        };
        Ok(Draft::new(asset, title))
    }
}

fn default_title(source_uri: &str) -> String {
    std::path::Path::new(source_uri)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// A marker as seen by a step builder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMarker {
    pub label: String,
    pub offset_s: f64,
    pub source_time_s: f64,
}

/// One ordered segment, flattened for conversion into a teaching step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSource {
    pub position: usize,
    pub segment_id: SegmentId,
    pub label: String,
    pub start_s: f64,
    pub end_s: f64,
    pub speed: f64,
    pub playback_duration_s: f64,
    pub markers: Vec<StepMarker>,
}

/// Everything a downstream step builder reads from a finished draft.
///
/// Editor-only state (playhead, zoom, selection) has no place here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineExport {
    pub draft_id: DraftId,
    pub title: String,
    pub difficulty: String,
    pub source_uri: String,
    pub playback_uri: String,
    pub total_playback_s: f64,
    pub steps: Vec<StepSource>,
}

/// Flatten the draft's ordered segments; ids missing from the map are skipped
pub fn export_steps(draft: &Draft) -> Vec<StepSource> {
    draft
        .ordered_segments()
        .enumerate()
        .map(|(position, segment)| StepSource {
            position,
            segment_id: segment.id.clone(),
            label: segment.label.clone(),
            start_s: segment.start_s,
            end_s: segment.end_s,
            speed: segment.speed,
            playback_duration_s: segment.playback_duration_s(),
            markers: segment
                .markers
                .iter()
                .map(|m| StepMarker {
                    label: m.label.clone(),
                    offset_s: m.offset_s,
                    source_time_s: segment.marker_time(m),
                })
                .collect(),
        })
        .collect()
}

/// Export view of a whole draft
pub fn export_timeline(draft: &Draft) -> TimelineExport {
    TimelineExport {
        draft_id: draft.id.clone(),
        title: draft.timeline.title.clone(),
        difficulty: draft.timeline.difficulty.clone(),
        source_uri: draft.asset.source_uri.clone(),
        playback_uri: draft.asset.playback_uri().to_string(),
        total_playback_s: draft.total_playback_s(),
        steps: export_steps(draft),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> MediaProbe {
        MediaProbe {
            duration_s: 42.0,
            frame_rate: 25.0,
            has_video: true,
            has_audio: false,
            width: 1280,
            height: 720,
        }
    }

    #[test]
    fn test_import_creates_empty_draft() {
        let draft = ImportDraftUseCase::execute("/cases/ercp_01.mp4", &probe(), "").unwrap();
        assert_eq!(draft.asset.duration_s, 42.0);
        assert_eq!(draft.timeline.title, "ercp_01");
        assert!(draft.segments.is_empty());
        assert!(draft.timeline.segment_order.is_empty());
    }

    #[test]
    fn test_import_rejects_trackless_source() {
        let mut p = probe();
        p.has_video = false;
        assert!(matches!(
            ImportDraftUseCase::execute("/x.bin", &p, "t"),
            Err(DomainError::InvalidMedia(_))
        ));
        assert!(ImportDraftUseCase::execute("  ", &probe(), "t").is_err());
    }

    #[test]
    fn test_export_empty_draft() {
        let draft = ImportDraftUseCase::execute("/cases/a.mp4", &probe(), "Case").unwrap();
        let export = export_timeline(&draft);
        assert!(export.steps.is_empty());
        assert_eq!(export.total_playback_s, 0.0);
    }

    #[test]
    fn test_export_follows_order_and_skips_missing() {
        let mut draft = ImportDraftUseCase::execute("/cases/a.mp4", &probe(), "Case").unwrap();
        let mut a = Segment::new(&draft.asset, 10.0, 14.0, "Cannulation").unwrap();
        a.speed = 2.0;
        a.markers.push(Marker::new(1.5, "Marker 1"));
        let b = Segment::new(&draft.asset, 0.0, 3.0, "Approach").unwrap();
        draft.timeline.segment_order = vec![b.id.clone(), SegmentId::from("gone"), a.id.clone()];
        draft.segments.insert(a.id.clone(), a.clone());
        draft.segments.insert(b.id.clone(), b.clone());

        let steps = export_steps(&draft);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label, "Approach");
        assert!(steps[0].markers.is_empty());
        assert_eq!(steps[1].position, 1);
        assert_eq!(steps[1].playback_duration_s, 2.0);
        assert_eq!(steps[1].markers[0].source_time_s, 11.5);
    }
}
