// Timeline editor - Interactive editing engine over one draft

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::autosave::AutosaveWorker;
use crate::app::history::{HistoryManager, DEFAULT_UNDO_LIMIT};
use crate::app::pipeline::AssetPatch;
use crate::config::EditorConfig;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::ports::FeedbackPort;

/// Called once with the final draft when the editor closes
pub type CloseCallback = Box<dyn FnOnce(Draft) + Send>;

/// Editing policies
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSettings {
    pub snap_radius_s: f64,
    pub undo_limit: usize,
    pub ripple_default: bool,
    pub marker_split_policy: MarkerSplitPolicy,
}

impl EditorSettings {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            snap_radius_s: config.snap_radius_s,
            undo_limit: config.undo_limit,
            ripple_default: config.ripple_default,
            marker_split_policy: config.marker_split_policy,
        }
    }
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            snap_radius_s: DEFAULT_SNAP_RADIUS_S,
            undo_limit: DEFAULT_UNDO_LIMIT,
            ripple_default: true,
            marker_split_policy: MarkerSplitPolicy::default(),
        }
    }
}

/// The editing engine.
///
/// Owns the draft for as long as the editor is open. Every structural
/// operation works on a copy and only commits it when it succeeds, so a
/// rejected operation leaves the draft untouched. Committed operations are
/// recorded for undo and handed to the autosave worker.
///
/// All methods take `&mut self`: mutations are serialized by the caller's
/// context, and pipeline results come in through [`Self::apply_asset_patch`]
/// on that same context.
pub struct TimelineEditor {
    draft: Draft,
    settings: EditorSettings,
    history: HistoryManager,
    in_s: Option<f64>,
    out_s: Option<f64>,
    ripple: bool,
    autosave: Option<AutosaveWorker>,
    feedback: Arc<dyn FeedbackPort>,
    on_close: Option<CloseCallback>,
}

impl TimelineEditor {
    /// Open `draft` for editing. The draft is sanitized first.
    pub fn new(
        mut draft: Draft,
        settings: EditorSettings,
        feedback: Arc<dyn FeedbackPort>,
        on_close: impl FnOnce(Draft) + Send + 'static,
    ) -> Self {
        draft.sanitize();
        info!(draft_id = %draft.id, segments = draft.timeline.segment_order.len(), "Editor opened");
        Self {
            history: HistoryManager::new(settings.undo_limit),
            ripple: settings.ripple_default,
            draft,
            settings,
            in_s: None,
            out_s: None,
            autosave: None,
            feedback,
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Persist every committed state through `worker`
    pub fn with_autosave(mut self, worker: AutosaveWorker) -> Self {
        self.autosave = Some(worker);
        self
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn in_point(&self) -> Option<f64> {
        self.in_s
    }

    pub fn out_point(&self) -> Option<f64> {
        self.out_s
    }

    pub fn ripple(&self) -> bool {
        self.ripple
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    // --- transient state --------------------------------------------------

    /// Snap and set the In candidate. Rejected if it would not be before Out.
    pub fn set_in(&mut self, raw_s: f64) -> EditResult<f64> {
        let at_s = self.snap(raw_s);
        if let Some(out_s) = self.out_s {
            if let Err(e) = validate_in_out(at_s, out_s) {
                return Err(self.reject(e));
            }
        }
        self.in_s = Some(at_s);
        debug!(in_s = at_s, "In set");
        Ok(at_s)
    }

    /// Snap and set the Out candidate. Rejected if it would not be after In.
    pub fn set_out(&mut self, raw_s: f64) -> EditResult<f64> {
        let at_s = self.snap(raw_s);
        if let Some(in_s) = self.in_s {
            if let Err(e) = validate_in_out(in_s, at_s) {
                return Err(self.reject(e));
            }
        }
        self.out_s = Some(at_s);
        debug!(out_s = at_s, "Out set");
        Ok(at_s)
    }

    pub fn clear_in_out(&mut self) {
        self.in_s = None;
        self.out_s = None;
    }

    pub fn set_ripple(&mut self, ripple: bool) {
        self.ripple = ripple;
    }

    /// Move the playhead; the value is clamped, not snapped. Returns the new position.
    pub fn seek(&mut self, at_s: f64) -> f64 {
        self.draft.ui.playhead_s = clamp_to_duration(at_s, self.draft.asset.duration_s);
        self.schedule_autosave();
        self.draft.ui.playhead_s
    }

    pub fn select(&mut self, id: &SegmentId) -> EditResult<()> {
        if !self.draft.segments.contains_key(id) {
            return Err(self.reject(EditError::UnknownSegment(id.to_string())));
        }
        self.draft.ui.selected_segment = Some(id.clone());
        self.schedule_autosave();
        Ok(())
    }

    /// Select the segment at `index` in playback order
    pub fn select_index(&mut self, index: usize) -> EditResult<SegmentId> {
        let len = self.draft.timeline.segment_order.len();
        let Some(id) = self.draft.timeline.segment_order.get(index).cloned() else {
            return Err(self.reject(EditError::InvalidPosition { index, len }));
        };
        self.select(&id)?;
        Ok(id)
    }

    pub fn clear_selection(&mut self) {
        self.draft.ui.selected_segment = None;
        self.schedule_autosave();
    }

    /// Non-finite or non-positive zoom levels are ignored
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.draft.ui.zoom = zoom;
            self.schedule_autosave();
        }
    }

    // --- structural operations -------------------------------------------

    /// Create a segment from In/Out, append it, select it and move the
    /// playhead to its end. Clears In/Out on success.
    pub fn add_segment(&mut self) -> EditResult<SegmentId> {
        let (Some(in_s), Some(out_s)) = (self.in_s, self.out_s) else {
            return Err(self.reject(EditError::MissingInOut));
        };
        let id = self.mutate("Add segment", |draft, _| {
            validate_new_segment(in_s, out_s)?;
            let label = format!("Segment {}", draft.timeline.segment_order.len() + 1);
            let segment = Segment::new(&draft.asset, in_s, out_s, label).ok_or(EditError::RangeTooShort {
                len_s: out_s - in_s,
                min_s: MIN_SEGMENT_S,
            })?;
            let id = segment.id.clone();
            draft.ui.playhead_s = segment.end_s;
            draft.ui.selected_segment = Some(id.clone());
            draft.timeline.segment_order.push(id.clone());
            draft.segments.insert(id.clone(), segment);
            Ok(id)
        })?;
        self.clear_in_out();
        Ok(id)
    }

    /// Split the selected segment at the snapped playhead. The first half
    /// keeps the id and the selection; returns the id of the second half.
    pub fn split_at_playhead(&mut self) -> EditResult<SegmentId> {
        let at_s = self.snap(self.draft.ui.playhead_s);
        self.mutate("Split segment", |draft, settings| {
            let id = selected_id(draft)?;
            let position = draft.timeline.position(&id).ok_or(EditError::NoSelection)?;
            let first = draft.segments.get_mut(&id).ok_or(EditError::NoSelection)?;
            let ((_, first_end), (second_start, second_end)) = split_ranges(first, at_s)?;

            let markers = std::mem::take(&mut first.markers);
            let (kept, moved) = partition_markers(markers, at_s - first.start_s, settings.marker_split_policy);
            first.markers = kept;
            first.end_s = first_end;

            let second = Segment {
                id: SegmentId::new(),
                asset_id: first.asset_id.clone(),
                start_s: second_start,
                end_s: second_end,
                speed: first.speed,
                label: first.label.clone(),
                markers: moved,
            };
            let second_id = second.id.clone();
            draft.timeline.segment_order.insert(position + 1, second_id.clone());
            draft.segments.insert(second_id.clone(), second);
            draft.ui.playhead_s = at_s;
            Ok(second_id)
        })
    }

    /// Merge the selected segment with the next one in order
    pub fn merge_with_next(&mut self) -> EditResult<()> {
        let relation = self.mutate("Merge segments", |draft, _| {
            let id = selected_id(draft)?;
            let position = draft.timeline.position(&id).ok_or(EditError::NoSelection)?;
            let next_id = draft
                .timeline
                .segment_order
                .get(position + 1)
                .cloned()
                .ok_or(EditError::NoSuccessor)?;
            let next = draft.segments.get(&next_id).cloned().ok_or(EditError::NoSuccessor)?;
            let first = draft.segments.get_mut(&id).ok_or(EditError::NoSelection)?;

            let relation = contiguity(first, &next);
            merge_into(first, next);
            draft.segments.remove(&next_id);
            draft.timeline.segment_order.remove(position + 1);
            Ok(relation)
        })?;

        match relation {
            Contiguity::Contiguous => {}
            Contiguity::Gap(gap_s) => self
                .feedback
                .advisory(&format!("Merged across a {:.2}s gap; the gap is now part of the segment", gap_s)),
            Contiguity::Overlap(overlap_s) => self
                .feedback
                .advisory(&format!("Merged segments overlapped by {:.2}s", overlap_s)),
        }
        Ok(())
    }

    /// Delete the selected segment
    pub fn delete_selected(&mut self) -> EditResult<SegmentId> {
        let Some(id) = self.draft.ui.selected_segment.clone() else {
            return Err(self.reject(EditError::NoSelection));
        };
        self.delete_segment(&id)?;
        Ok(id)
    }

    /// Delete `id`. With ripple on, every later segment moves left by the
    /// deleted segment's length.
    pub fn delete_segment(&mut self, id: &SegmentId) -> EditResult<()> {
        let ripple = self.ripple;
        self.mutate("Delete segment", |draft, _| {
            let position = draft
                .timeline
                .position(id)
                .ok_or_else(|| EditError::UnknownSegment(id.to_string()))?;
            draft.timeline.segment_order.remove(position);
            let removed = draft.segments.remove(id);

            if let (true, Some(removed)) = (ripple, &removed) {
                let shift_s = removed.duration_s();
                for later in &draft.timeline.segment_order[position..] {
                    if let Some(segment) = draft.segments.get_mut(later) {
                        let (start_s, end_s) = ripple_shift(segment.start_s, segment.end_s, shift_s);
                        segment.start_s = start_s;
                        segment.end_s = end_s;
                    }
                }
            }

            if draft.ui.selected_segment.as_ref() == Some(id) {
                let order = &draft.timeline.segment_order;
                draft.ui.selected_segment = order
                    .get(position)
                    .or_else(|| position.checked_sub(1).and_then(|p| order.get(p)))
                    .cloned();
            }
            Ok(())
        })
    }

    /// Advance the selected segment to the next speed preset; returns the new speed
    pub fn cycle_speed(&mut self) -> EditResult<f64> {
        self.mutate("Change speed", |draft, _| {
            let id = selected_id(draft)?;
            let segment = draft.segments.get_mut(&id).ok_or(EditError::NoSelection)?;
            segment.speed = next_speed(segment.speed);
            Ok(segment.speed)
        })
    }

    /// Drop a marker on the selected segment at the snapped playhead
    pub fn add_marker(&mut self) -> EditResult<MarkerId> {
        let at_s = self.snap(self.draft.ui.playhead_s);
        self.mutate("Add marker", |draft, _| {
            let id = selected_id(draft)?;
            let segment = draft.segments.get_mut(&id).ok_or(EditError::NoSelection)?;
            if !segment.contains_with_margin(at_s, 0.0) {
                return Err(EditError::MarkerOutsideSegment { at_s });
            }
            let marker = Marker::new(at_s - segment.start_s, format!("Marker {}", segment.markers.len() + 1));
            let marker_id = marker.id.clone();
            segment.markers.push(marker);
            Ok(marker_id)
        })
    }

    pub fn remove_marker(&mut self, marker_id: &MarkerId) -> EditResult<()> {
        self.mutate("Remove marker", |draft, _| {
            for segment in draft.segments.values_mut() {
                if let Some(index) = segment.markers.iter().position(|m| &m.id == marker_id) {
                    segment.markers.remove(index);
                    return Ok(());
                }
            }
            Err(EditError::UnknownMarker(marker_id.to_string()))
        })
    }

    /// Move `id` so it ends up at `to_index` in playback order
    pub fn move_segment(&mut self, id: &SegmentId, to_index: usize) -> EditResult<()> {
        let len = self.draft.timeline.segment_order.len();
        match self.draft.timeline.position(id) {
            None => return Err(self.reject(EditError::UnknownSegment(id.to_string()))),
            Some(_) if to_index >= len => {
                return Err(self.reject(EditError::InvalidPosition { index: to_index, len }))
            }
            Some(from) if from == to_index => return Ok(()),
            Some(_) => {}
        }
        self.mutate("Move segment", |draft, _| {
            let order = &mut draft.timeline.segment_order;
            let from = order
                .iter()
                .position(|s| s == id)
                .ok_or_else(|| EditError::UnknownSegment(id.to_string()))?;
            let moved = order.remove(from);
            order.insert(to_index, moved);
            Ok(())
        })
    }

    pub fn rename_segment(&mut self, id: &SegmentId, label: impl Into<String>) -> EditResult<()> {
        let label = label.into();
        self.mutate("Rename segment", |draft, _| {
            let segment = draft
                .segments
                .get_mut(id)
                .ok_or_else(|| EditError::UnknownSegment(id.to_string()))?;
            segment.label = label;
            Ok(())
        })
    }

    // --- history ----------------------------------------------------------

    /// Restore the state before the last structural operation
    pub fn undo(&mut self) -> EditResult<()> {
        let Some(entry) = self.history.undo(&self.draft) else {
            return Err(self.reject(EditError::NothingToUndo));
        };
        self.restore(entry.snapshot);
        Ok(())
    }

    /// Re-apply the last undone operation
    pub fn redo(&mut self) -> EditResult<()> {
        let Some(entry) = self.history.redo(&self.draft) else {
            return Err(self.reject(EditError::NothingToRedo));
        };
        self.restore(entry.snapshot);
        Ok(())
    }

    // Derived resources arrive independently of edits, so the asset always
    // comes from the current state
    fn restore(&mut self, mut snapshot: Draft) {
        snapshot.asset = self.draft.asset.clone();
        self.draft = snapshot;
        self.schedule_autosave();
    }

    // --- pipeline results -------------------------------------------------

    /// Write a derived-resource location onto the asset. Not undoable.
    /// Returns false for a patch addressed to another asset.
    pub fn apply_asset_patch(&mut self, patch: &AssetPatch) -> bool {
        if patch.asset_id != self.draft.asset.id {
            debug!(asset_id = %patch.asset_id, "Patch for another asset ignored");
            return false;
        }
        self.draft.asset.set_derived(patch.field, patch.uri.clone());
        self.draft.touch();
        self.schedule_autosave();
        info!(draft_id = %self.draft.id, field = %patch.field, uri = %patch.uri, "Asset patched");
        true
    }

    /// Apply every patch already waiting on `patches`; returns how many applied
    pub fn drain_patches(&mut self, patches: &mut mpsc::UnboundedReceiver<AssetPatch>) -> usize {
        let mut applied = 0;
        while let Ok(patch) = patches.try_recv() {
            if self.apply_asset_patch(&patch) {
                applied += 1;
            }
        }
        applied
    }

    /// Flush pending autosave, then hand the final draft to the close
    /// callback. The flush result is returned after the callback ran; a
    /// failed flush was already reported through the feedback port.
    pub async fn close(mut self) -> Result<(), DomainError> {
        let flushed = match self.autosave.take() {
            Some(worker) => worker.shutdown().await,
            None => Ok(()),
        };
        info!(draft_id = %self.draft.id, "Editor closed");
        if let Some(on_close) = self.on_close.take() {
            on_close(self.draft);
        }
        flushed
    }

    // --- internals --------------------------------------------------------

    fn snap(&self, raw_s: f64) -> f64 {
        let outcome = SnapIndex::build(&self.draft, self.settings.snap_radius_s).snap(raw_s);
        if let Some(target) = outcome.target {
            self.feedback.snapped(outcome.value, target);
        }
        outcome.value
    }

    fn reject(&self, err: EditError) -> EditError {
        debug!(draft_id = %self.draft.id, error = %err, "Edit rejected");
        self.feedback.advisory(&err.to_string());
        err
    }

    fn schedule_autosave(&self) {
        if let Some(worker) = &self.autosave {
            worker.schedule(self.draft.clone());
        }
    }

    /// Run `op` on a working copy; commit, record and autosave on success
    fn mutate<T>(
        &mut self,
        description: &str,
        op: impl FnOnce(&mut Draft, &EditorSettings) -> EditResult<T>,
    ) -> EditResult<T> {
        let mut working = self.draft.clone();
        match op(&mut working, &self.settings) {
            Ok(value) => {
                let before = std::mem::replace(&mut self.draft, working);
                self.history.record(DraftDelta {
                    timestamp: Utc::now(),
                    description: description.to_string(),
                    snapshot: before,
                });
                self.draft.touch();
                debug_assert!(self.draft.check_invariants().is_ok());
                self.schedule_autosave();
                debug!(draft_id = %self.draft.id, operation = description, "Edit committed");
                Ok(value)
            }
            Err(err) => Err(self.reject(err)),
        }
    }
}

fn selected_id(draft: &Draft) -> EditResult<SegmentId> {
    draft
        .ui
        .selected_segment
        .clone()
        .filter(|id| draft.segments.contains_key(id))
        .ok_or(EditError::NoSelection)
}
