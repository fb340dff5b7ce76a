use std::sync::Arc;

use tracing::debug;

use crate::adapters::{FFmpegAdapter, FileDraftStore, TracingFeedbackAdapter};
use crate::app::draft_interactor::DraftInteractor;
use crate::app::editor::EditorSettings;
use crate::app::pipeline::{MediaPipeline, PipelineSettings};
use crate::config::ReelConfig;
use crate::domain::errors::DomainError;
use crate::ports::{DecodePort, DraftStorePort, FeedbackPort, ProbePort, TranscodePort};

pub trait AppContainer: Send + Sync {
    fn config(&self) -> &ReelConfig;
    fn draft_interactor(&self) -> Arc<DraftInteractor>;
}

pub struct DefaultAppContainer {
    config: ReelConfig,
    draft_interactor: Arc<DraftInteractor>,
}

impl DefaultAppContainer {
    /// Wire the adapters selected by `config` and the enabled features
    pub fn new(config: ReelConfig) -> Result<Self, DomainError> {
        let root = config.store_root();
        let (probe_port, decode_port) = media_ports(&config)?;
        let transcode_port = Arc::new(FFmpegAdapter::new(config.pipeline.ffmpeg_bin.clone()));
        let store_port = Arc::new(FileDraftStore::new(&root));
        let feedback_port = Arc::new(TracingFeedbackAdapter::new());

        let pipeline = Arc::new(MediaPipeline::new(
            Arc::clone(&probe_port),
            decode_port,
            transcode_port as Arc<dyn TranscodePort>,
            PipelineSettings::from_config(&config.pipeline, &root),
        ));

        let draft_interactor = Arc::new(DraftInteractor::new(
            probe_port,
            store_port as Arc<dyn DraftStorePort>,
            feedback_port as Arc<dyn FeedbackPort>,
            pipeline,
            EditorSettings::from_config(&config.editor),
            config.autosave_debounce(),
        ));

        debug!(root = %root.display(), "Container ready");
        Ok(Self {
            config,
            draft_interactor,
        })
    }
}

#[cfg(not(feature = "libav"))]
fn media_ports(config: &ReelConfig) -> Result<(Arc<dyn ProbePort>, Arc<dyn DecodePort>), DomainError> {
    use crate::adapters::FFprobeAdapter;

    let probe: Arc<dyn ProbePort> = Arc::new(FFprobeAdapter::new(config.pipeline.ffprobe_bin.clone()));
    let decode: Arc<dyn DecodePort> = Arc::new(FFmpegAdapter::new(config.pipeline.ffmpeg_bin.clone()));
    Ok((probe, decode))
}

#[cfg(feature = "libav")]
fn media_ports(_config: &ReelConfig) -> Result<(Arc<dyn ProbePort>, Arc<dyn DecodePort>), DomainError> {
    use crate::adapters::{DecodeLibavAdapter, ProbeLibavAdapter};

    let probe: Arc<dyn ProbePort> = Arc::new(ProbeLibavAdapter::new()?);
    let decode: Arc<dyn DecodePort> = Arc::new(DecodeLibavAdapter::new()?);
    Ok((probe, decode))
}

impl AppContainer for DefaultAppContainer {
    fn config(&self) -> &ReelConfig {
        &self.config
    }

    fn draft_interactor(&self) -> Arc<DraftInteractor> {
        Arc::clone(&self.draft_interactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_container_uses_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ReelConfig::default();
        config.store.root = Some(dir.path().to_path_buf());

        let container = DefaultAppContainer::new(config).unwrap();
        assert_eq!(container.config().store_root(), dir.path());
        assert_eq!(
            container.draft_interactor().pipeline().settings().output_root,
            dir.path()
        );
        assert!(container.draft_interactor().list().await.unwrap().is_empty());
    }
}
