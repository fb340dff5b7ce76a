// Draft interactor - Host-side orchestration of import, processing and storage

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::app::autosave::AutosaveWorker;
use crate::app::editor::{EditorSettings, TimelineEditor};
use crate::app::pipeline::{MediaPipeline, PipelineReport};
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::usecases::{export_timeline, ImportDraftUseCase, TimelineExport};
use crate::ports::*;
use crate::utils::path::PathUtils;

/// One line of a draft listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub id: DraftId,
    pub title: String,
    pub segments: usize,
    pub playback_s: f64,
    pub updated_at: DateTime<Utc>,
}

impl DraftSummary {
    fn of(draft: &Draft) -> Self {
        Self {
            id: draft.id.clone(),
            title: draft.timeline.title.clone(),
            segments: draft.timeline.segment_order.len(),
            playback_s: draft.total_playback_s(),
            updated_at: draft.updated_at,
        }
    }
}

/// An open editor plus the receiver its close callback delivers to
pub struct EditSession {
    pub editor: TimelineEditor,
    pub closed: oneshot::Receiver<Draft>,
}

impl EditSession {
    /// Close the editor and wait for the final draft
    pub async fn finish(self) -> Result<Draft, DomainError> {
        let flushed = self.editor.close().await;
        let draft = self
            .closed
            .await
            .map_err(|_| DomainError::InternalError("Editor closed without a draft".to_string()))?;
        flushed.map(|_| draft)
    }
}

/// Interactor for the draft lifecycle
pub struct DraftInteractor {
    probe_port: Arc<dyn ProbePort>,
    store_port: Arc<dyn DraftStorePort>,
    feedback_port: Arc<dyn FeedbackPort>,
    pipeline: Arc<MediaPipeline>,
    editor_settings: EditorSettings,
    autosave_debounce: Duration,
}

impl DraftInteractor {
    pub fn new(
        probe_port: Arc<dyn ProbePort>,
        store_port: Arc<dyn DraftStorePort>,
        feedback_port: Arc<dyn FeedbackPort>,
        pipeline: Arc<MediaPipeline>,
        editor_settings: EditorSettings,
        autosave_debounce: Duration,
    ) -> Self {
        Self {
            probe_port,
            store_port,
            feedback_port,
            pipeline,
            editor_settings,
            autosave_debounce,
        }
    }

    pub fn pipeline(&self) -> &Arc<MediaPipeline> {
        &self.pipeline
    }

    /// Probe `input`, create a draft over it and store the first snapshot
    pub async fn import(&self, input: &Path, title: &str) -> Result<Draft, DomainError> {
        if !input.exists() {
            return Err(DomainError::FileNotFound(input.display().to_string()));
        }
        let location = PathUtils::new().to_location(input);

        let probe = self.probe_port.probe_media(Path::new(&location)).await?;
        let draft = ImportDraftUseCase::execute(&location, &probe, title)?;
        self.store_port.save_snapshot(&draft).await?;

        info!(
            draft_id = %draft.id,
            duration_s = draft.asset.duration_s,
            has_audio = probe.has_audio,
            "Draft imported"
        );
        Ok(draft)
    }

    /// Open `draft` in an editor wired to autosave
    pub fn open_editor(&self, draft: Draft) -> EditSession {
        let (tx, closed) = oneshot::channel();
        let worker = AutosaveWorker::spawn(
            Arc::clone(&self.store_port),
            Arc::clone(&self.feedback_port),
            self.autosave_debounce,
        );
        let editor = TimelineEditor::new(
            draft,
            self.editor_settings.clone(),
            Arc::clone(&self.feedback_port),
            move |final_draft| {
                let _ = tx.send(final_draft);
            },
        )
        .with_autosave(worker);
        EditSession { editor, closed }
    }

    /// Run the media pipeline for `draft` and write each result onto its
    /// asset as it arrives. Returns the patched, saved draft.
    pub async fn process(&self, draft: Draft) -> Result<(Draft, PipelineReport), DomainError> {
        let asset = draft.asset.clone();
        let mut session = self.open_editor(draft);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = Arc::clone(&self.pipeline).spawn(asset, tx);
        while let Some(patch) = rx.recv().await {
            session.editor.apply_asset_patch(&patch);
        }
        let report = run.join().await?;

        for stage in report.stages.iter().filter(|s| !s.succeeded()) {
            warn!(stage = %stage.field, outcome = ?stage.outcome, "Derived resource unavailable");
        }
        let draft = session.finish().await?;
        Ok((draft, report))
    }

    pub async fn load(&self, id: &DraftId) -> Result<Option<Draft>, DomainError> {
        self.store_port.load_draft(id).await
    }

    /// Summaries of every stored draft, newest first. Unreadable snapshots
    /// are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<DraftSummary>, DomainError> {
        let mut summaries = Vec::new();
        for id in self.store_port.list_drafts().await? {
            match self.store_port.load_draft(&id).await {
                Ok(Some(draft)) => summaries.push(DraftSummary::of(&draft)),
                Ok(None) => {}
                Err(e) => warn!(draft_id = %id, error = %e, "Skipping unreadable draft"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub async fn delete(&self, id: &DraftId) -> Result<(), DomainError> {
        self.store_port.delete_draft(id).await
    }

    /// Export view of a stored draft
    pub async fn export(&self, id: &DraftId) -> Result<Option<TimelineExport>, DomainError> {
        Ok(self.load(id).await?.as_ref().map(export_timeline))
    }
}
