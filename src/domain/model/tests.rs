// Unit tests for domain models

#[cfg(test)]
mod tests {
    use crate::domain::model::*;

    fn test_asset() -> MediaAsset {
        MediaAsset::new("file:///cases/scope.mp4", 10.0, 30.0)
    }

    #[test]
    fn test_asset_clamps_invalid_duration() {
        assert_eq!(MediaAsset::new("a.mp4", f64::NAN, 30.0).duration_s, 0.0);
        assert_eq!(MediaAsset::new("a.mp4", f64::INFINITY, 30.0).duration_s, 0.0);
        assert_eq!(MediaAsset::new("a.mp4", -4.0, 30.0).duration_s, 0.0);
        assert_eq!(MediaAsset::new("a.mp4", 12.5, 30.0).duration_s, 12.5);
    }

    #[test]
    fn test_asset_derived_fields_last_writer_wins() {
        let mut asset = test_asset();
        assert_eq!(asset.playback_uri(), "file:///cases/scope.mp4");

        asset.set_derived(DerivedField::Proxy, "proxy-1.mp4".to_string());
        asset.set_derived(DerivedField::Proxy, "proxy-2.mp4".to_string());
        assert_eq!(asset.derived(DerivedField::Proxy), Some("proxy-2.mp4"));
        assert_eq!(asset.playback_uri(), "proxy-2.mp4");
        assert_eq!(asset.derived(DerivedField::Waveform), None);
    }

    #[test]
    fn test_segment_new_clamps_to_asset() {
        let asset = test_asset();
        let segment = Segment::new(&asset, -1.0, 14.0, "whole").unwrap();
        assert_eq!(segment.start_s, 0.0);
        assert_eq!(segment.end_s, 10.0);
        assert_eq!(segment.speed, 1.0);
        assert_eq!(segment.asset_id, asset.id);
    }

    #[test]
    fn test_segment_new_rejects_short_range() {
        let asset = test_asset();
        assert!(Segment::new(&asset, 2.0, 2.05, "tiny").is_none());
        assert!(Segment::new(&asset, 3.0, 2.0, "backwards").is_none());
        assert!(Segment::new(&asset, 2.0, 2.1, "minimum").is_some());
    }

    #[test]
    fn test_segment_playback_duration() {
        let asset = test_asset();
        let mut segment = Segment::new(&asset, 2.0, 6.0, "a").unwrap();
        segment.speed = 2.0;
        assert_eq!(segment.duration_s(), 4.0);
        assert_eq!(segment.playback_duration_s(), 2.0);
    }

    #[test]
    fn test_draft_sanitize_repairs_order_and_times() {
        let asset = test_asset();
        let mut draft = Draft::new(asset.clone(), "Polypectomy");
        let a = Segment::new(&asset, 0.0, 2.0, "a").unwrap();
        let mut b = Segment::new(&asset, 2.0, 5.0, "b").unwrap();
        b.end_s = f64::NAN;
        let orphan = Segment::new(&asset, 5.0, 6.0, "orphan").unwrap();

        draft.timeline.segment_order = vec![
            a.id.clone(),
            a.id.clone(),
            SegmentId::from("missing"),
            b.id.clone(),
        ];
        draft.segments.insert(a.id.clone(), a.clone());
        draft.segments.insert(b.id.clone(), b.clone());
        draft.segments.insert(orphan.id.clone(), orphan.clone());
        draft.ui.playhead_s = f64::NAN;
        draft.ui.selected_segment = Some(orphan.id.clone());

        draft.sanitize();

        assert_eq!(draft.timeline.segment_order, vec![a.id.clone(), b.id.clone()]);
        assert!(!draft.segments.contains_key(&orphan.id));
        assert_eq!(draft.ui.playhead_s, 0.0);
        assert_eq!(draft.ui.selected_segment, None);
        let repaired = draft.segment(&b.id).unwrap();
        assert!(repaired.end_s - repaired.start_s >= MIN_SEGMENT_S - 1e-9);
        assert!(draft.check_invariants().is_ok());
    }

    #[test]
    fn test_check_invariants_detects_duplicates() {
        let asset = test_asset();
        let mut draft = Draft::new(asset.clone(), "t");
        let a = Segment::new(&asset, 0.0, 2.0, "a").unwrap();
        draft.timeline.segment_order = vec![a.id.clone(), a.id.clone()];
        draft.segments.insert(a.id.clone(), a);
        assert!(draft.check_invariants().is_err());
    }

    #[test]
    fn test_ordered_segments_skips_missing_ids() {
        let asset = test_asset();
        let mut draft = Draft::new(asset.clone(), "t");
        let a = Segment::new(&asset, 0.0, 2.0, "a").unwrap();
        draft.timeline.segment_order = vec![SegmentId::from("ghost"), a.id.clone()];
        draft.segments.insert(a.id.clone(), a);
        assert_eq!(draft.ordered_segments().count(), 1);
    }

    #[test]
    fn test_nan_playhead_serializes_after_sanitize() {
        let mut draft = Draft::new(test_asset(), "t");
        draft.ui.playhead_s = f64::NAN;
        assert!(serde_json::to_string(&draft).is_err());

        draft.sanitize();
        let json = serde_json::to_string(&draft).unwrap();
        let back: Draft = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ui.playhead_s, 0.0);
    }

    #[test]
    fn test_probe_scaled_height() {
        let probe = MediaProbe {
            duration_s: 10.0,
            frame_rate: 30.0,
            has_video: true,
            has_audio: true,
            width: 1920,
            height: 1080,
        };
        assert_eq!(probe.scaled_height(320), 180);
    }
}
