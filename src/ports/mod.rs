// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::SnapTarget;

/// Port for media file probing
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Probe a source file: duration, frame rate and which tracks it carries
    async fn probe_media(&self, path: &Path) -> Result<MediaProbe, DomainError>;
}

/// Port for decoding stills and raw audio out of a source file
#[async_trait]
pub trait DecodePort: Send + Sync {
    /// Decode the frame shown at `at_s`, scaled down to at most `max_width` pixels wide
    async fn extract_frame(
        &self,
        path: &Path,
        at_s: f64,
        max_width: u32,
    ) -> Result<RgbImage, DomainError>;

    /// Decode the first audio track, downmixed to mono f32 at `sample_rate`.
    ///
    /// Returns `Ok(None)` when the file has no audio track.
    async fn read_audio_mono(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<Option<Vec<f32>>, DomainError>;
}

/// Encoding parameters for a scrubbing proxy
#[derive(Debug, Clone, PartialEq)]
pub struct ProxySettings {
    /// Output height in pixels; width follows the source aspect ratio
    pub max_height: u32,
    /// x264 constant rate factor
    pub crf: u8,
    pub audio_bitrate_kbps: u32,
    pub threads: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            max_height: 720,
            crf: 28,
            audio_bitrate_kbps: 96,
            threads: num_cpus::get().clamp(1, 8),
        }
    }
}

/// Port for transcoding a source into a lightweight proxy
#[async_trait]
pub trait TranscodePort: Send + Sync {
    /// Write an H.264/AAC MP4 proxy of `source` to `dest`
    async fn transcode_proxy(
        &self,
        source: &Path,
        dest: &Path,
        settings: &ProxySettings,
    ) -> Result<(), DomainError>;
}

/// Port for durable draft snapshots
#[async_trait]
pub trait DraftStorePort: Send + Sync {
    /// Atomically replace the stored snapshot for `draft.id`
    async fn save_snapshot(&self, draft: &Draft) -> Result<(), DomainError>;

    /// Load the last fully written snapshot, or `None` if there is none
    async fn load_draft(&self, id: &DraftId) -> Result<Option<Draft>, DomainError>;

    /// Remove a draft; removing an absent draft succeeds
    async fn delete_draft(&self, id: &DraftId) -> Result<(), DomainError>;

    /// Ids of every stored draft
    async fn list_drafts(&self) -> Result<Vec<DraftId>, DomainError>;
}

/// Port for user feedback owned by the host (haptics, toasts, notices)
pub trait FeedbackPort: Send + Sync {
    /// A committed point was pulled onto a snap target
    fn snapped(&self, at_s: f64, target: SnapTarget);

    /// A transient validation or warning message
    fn advisory(&self, message: &str);

    /// A snapshot could not be written; the in-memory draft is still authoritative
    fn persistence_failed(&self, draft_id: &DraftId, error: &DomainError);
}
