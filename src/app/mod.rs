// Application layer - Editing engine and use case interactors

pub mod autosave;
pub mod container;
pub mod draft_interactor;
pub mod editor;
pub mod history;
pub mod pipeline;

// Re-export interactors
pub use autosave::AutosaveWorker;
pub use draft_interactor::{DraftInteractor, DraftSummary, EditSession};
pub use editor::{EditorSettings, TimelineEditor};
pub use history::HistoryManager;
pub use pipeline::{AssetPatch, MediaPipeline, PipelineReport, PipelineRun, PipelineSettings, StageOutcome, StageReport};
