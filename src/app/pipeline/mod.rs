// Media pipeline interactor - Derives proxy, thumbnail sprite and waveform for an asset

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::analysis::envelope::{self, WaveformEnvelope, ENVELOPE_SAMPLE_RATE};
use crate::analysis::sprite::{self, SpriteManifest};
use crate::config::PipelineConfig;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;
use crate::utils::atomic;
use crate::utils::path::PathUtils;

/// A derived-resource location to write onto an asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPatch {
    pub asset_id: AssetId,
    pub field: DerivedField,
    pub uri: String,
}

/// How one stage ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed { uri: String },
    Failed { error: String },
    Cancelled,
}

/// Result of one stage after all its attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub field: DerivedField,
    pub outcome: StageOutcome,
    pub attempts: u32,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, StageOutcome::Completed { .. })
    }
}

/// Results of a whole pipeline run, in proxy, sprite, waveform order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub asset_id: AssetId,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn stage(&self, field: DerivedField) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.field == field)
    }

    /// Patches for every completed stage
    pub fn patches(&self) -> Vec<AssetPatch> {
        self.stages
            .iter()
            .filter_map(|stage| match &stage.outcome {
                StageOutcome::Completed { uri } => Some(AssetPatch {
                    asset_id: self.asset_id.clone(),
                    field: stage.field,
                    uri: uri.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Tunables of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root under which `derived/<asset-id>/` is created
    pub output_root: PathBuf,
    pub thumbnail_interval_s: f64,
    pub sprite_columns: u32,
    pub tile_width: u32,
    pub waveform_window: usize,
    pub proxy: ProxySettings,
    pub max_attempts: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig, output_root: &Path) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            thumbnail_interval_s: config.thumbnail_interval_s,
            sprite_columns: config.sprite_columns,
            tile_width: config.tile_width,
            waveform_window: config.waveform_window,
            proxy: config.proxy_settings(),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Interactor running the three derivation stages.
///
/// Stages never share state; each one reports through its own
/// [`StageReport`] and at most one [`AssetPatch`].
pub struct MediaPipeline {
    probe_port: Arc<dyn ProbePort>,
    decode_port: Arc<dyn DecodePort>,
    transcode_port: Arc<dyn TranscodePort>,
    settings: PipelineSettings,
}

/// A pipeline run on a background task.
///
/// Each run has its own cancellation token. Dropping the handle before the
/// run finishes abandons the stages still in flight.
pub struct PipelineRun {
    handle: JoinHandle<PipelineReport>,
    cancel: CancellationToken,
    guard: DropGuard,
}

impl PipelineRun {
    /// Abandon in-flight stages; nothing is reported for them afterwards
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every stage to finish or observe cancellation
    pub async fn join(self) -> Result<PipelineReport, DomainError> {
        let PipelineRun { handle, guard, .. } = self;
        let report = handle
            .await
            .map_err(|e| DomainError::InternalError(format!("Pipeline task failed: {}", e)))?;
        guard.disarm();
        Ok(report)
    }
}

/// Local path of an asset's source location
pub fn source_path(asset: &MediaAsset) -> PathBuf {
    let uri = asset.source_uri.as_str();
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

impl MediaPipeline {
    pub fn new(
        probe_port: Arc<dyn ProbePort>,
        decode_port: Arc<dyn DecodePort>,
        transcode_port: Arc<dyn TranscodePort>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            probe_port,
            decode_port,
            transcode_port,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn output_dir(&self, asset: &MediaAsset) -> PathBuf {
        PathUtils::new().derived_dir(&self.settings.output_root, asset.id.as_str())
    }

    /// Transcode a scrubbing proxy; the caller falls back to the source on error
    pub async fn generate_proxy(&self, asset: &MediaAsset) -> Result<String, DomainError> {
        let source = source_path(asset);
        let probe = self.probe_port.probe_media(&source).await?;
        if !probe.has_video {
            return Err(DomainError::InvalidMedia(format!(
                "{} has no video track to proxy",
                source.display()
            )));
        }

        let dest = self.output_dir(asset).join("proxy.mp4");
        let temp = atomic::temp_beside(&dest)
            .map_err(|e| DomainError::ProcessingError(format!("Failed to prepare proxy file: {}", e)))?;
        self.transcode_port
            .transcode_proxy(&source, temp.path(), &self.settings.proxy)
            .await?;
        atomic::persist(temp, &dest)
            .map_err(|e| DomainError::ProcessingError(format!("Failed to store proxy: {}", e)))?;

        Ok(dest.to_string_lossy().to_string())
    }

    /// Sample frames every `interval_s` and composite them into one JPEG grid
    pub async fn generate_thumbnail_sprite(
        &self,
        asset: &MediaAsset,
        interval_s: f64,
    ) -> Result<String, DomainError> {
        let source = source_path(asset);
        let interval = sprite::effective_interval(asset.duration_s, interval_s);
        let tile_width = self.settings.tile_width.min(sprite::MAX_TILE_WIDTH);

        let mut frames = Vec::new();
        let mut frame_times = Vec::new();
        let mut last_error = None;
        for at_s in sprite::sample_times(asset.duration_s, interval) {
            match self.decode_port.extract_frame(&source, at_s, tile_width).await {
                Ok(frame) => {
                    frames.push(frame);
                    frame_times.push(at_s);
                }
                Err(e) => {
                    debug!(asset_id = %asset.id, at_s, error = %e, "Frame skipped");
                    last_error = Some(e);
                }
            }
        }

        if frames.is_empty() {
            warn!(asset_id = %asset.id, "No frames sampled; falling back to the first frame");
            let first = self
                .decode_port
                .extract_frame(&source, 0.0, tile_width)
                .await
                .map_err(|e| last_error.take().unwrap_or(e))?;
            frames.push(first);
            frame_times.push(0.0);
        }

        let columns = self.settings.sprite_columns;
        let encoded = tokio::task::spawn_blocking(move || -> Result<_, DomainError> {
            let (grid, layout) = sprite::compose(&frames, tile_width, columns)
                .ok_or_else(|| DomainError::InternalError("No frames to composite".to_string()))?;
            let mut bytes = Vec::new();
            JpegEncoder::new_with_quality(&mut bytes, 80)
                .encode_image(&grid)
                .map_err(|e| DomainError::ProcessingError(format!("Failed to encode sprite: {}", e)))?;
            Ok((bytes, layout))
        })
        .await
        .map_err(|e| DomainError::InternalError(format!("Sprite task failed: {}", e)))??;
        let (bytes, layout) = encoded;

        let dir = self.output_dir(asset);
        let sprite_path = dir.join("sprite.jpg");
        let manifest = SpriteManifest {
            layout,
            interval_s: interval,
            frame_times_s: frame_times,
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        write_file(&dir.join("sprite.json"), manifest_bytes).await?;
        write_file(&sprite_path, bytes).await?;

        Ok(sprite_path.to_string_lossy().to_string())
    }

    /// Compute the loudness envelope. A missing or unreadable audio track
    /// yields an empty envelope; only storing the result can fail.
    pub async fn generate_waveform(&self, asset: &MediaAsset, window: usize) -> Result<String, DomainError> {
        let source = source_path(asset);
        let window = envelope::effective_window(window);

        let samples = match self.decode_port.read_audio_mono(&source, ENVELOPE_SAMPLE_RATE).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(asset_id = %asset.id, error = %e, "Audio unreadable; storing an empty envelope");
                None
            }
        };
        let result = match samples {
            Some(samples) => WaveformEnvelope::from_samples(&samples, window, ENVELOPE_SAMPLE_RATE),
            None => WaveformEnvelope::empty(window, ENVELOPE_SAMPLE_RATE),
        };

        let path = self.output_dir(asset).join("waveform.json");
        write_file(&path, serde_json::to_vec(&result)?).await?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Run the three stages concurrently to completion. Each completed stage
    /// is sent on `patches` as soon as it finishes.
    pub async fn run(&self, asset: &MediaAsset, patches: &mpsc::UnboundedSender<AssetPatch>) -> PipelineReport {
        self.run_until(asset, patches, &CancellationToken::new()).await
    }

    /// Like [`Self::run`], but stages still running when `cancel` fires
    /// report [`StageOutcome::Cancelled`] and send nothing.
    pub async fn run_until(
        &self,
        asset: &MediaAsset,
        patches: &mpsc::UnboundedSender<AssetPatch>,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        info!(asset_id = %asset.id, source = %asset.source_uri, "Media pipeline started");
        let interval = self.settings.thumbnail_interval_s;
        let window = self.settings.waveform_window;

        let (proxy, sprite, waveform) = tokio::join!(
            self.stage(asset, DerivedField::Proxy, patches, cancel, || self.generate_proxy(asset)),
            self.stage(asset, DerivedField::ThumbnailSprite, patches, cancel, || self
                .generate_thumbnail_sprite(asset, interval)),
            self.stage(asset, DerivedField::Waveform, patches, cancel, || self
                .generate_waveform(asset, window)),
        );

        let report = PipelineReport {
            asset_id: asset.id.clone(),
            stages: vec![proxy, sprite, waveform],
        };
        info!(
            asset_id = %asset.id,
            completed = report.stages.iter().filter(|s| s.succeeded()).count(),
            "Media pipeline finished"
        );
        report
    }

    /// Run on a background task
    pub fn spawn(self: Arc<Self>, asset: MediaAsset, patches: mpsc::UnboundedSender<AssetPatch>) -> PipelineRun {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { self.run_until(&asset, &patches, &token).await });
        PipelineRun {
            handle,
            guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    async fn stage<'a, F, Fut>(
        &'a self,
        asset: &'a MediaAsset,
        field: DerivedField,
        patches: &mpsc::UnboundedSender<AssetPatch>,
        cancel: &CancellationToken,
        attempt: F,
    ) -> StageReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<String, DomainError>> + 'a,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempts = 0;
        let outcome = loop {
            if cancel.is_cancelled() {
                break StageOutcome::Cancelled;
            }
            attempts += 1;
            let result = tokio::select! {
                _ = cancel.cancelled() => break StageOutcome::Cancelled,
                result = attempt() => result,
            };
            match result {
                Ok(uri) => break StageOutcome::Completed { uri },
                Err(e) if attempts < max_attempts && !matches!(e, DomainError::InvalidMedia(_) | DomainError::FileNotFound(_)) => {
                    warn!(asset_id = %asset.id, stage = %field, attempt = attempts, error = %e, "Stage failed; retrying");
                }
                Err(e) => {
                    warn!(asset_id = %asset.id, stage = %field, attempts, error = %e, "Stage failed");
                    break StageOutcome::Failed { error: e.to_string() };
                }
            }
        };

        if let StageOutcome::Completed { uri } = &outcome {
            if cancel.is_cancelled() {
                return StageReport {
                    field,
                    outcome: StageOutcome::Cancelled,
                    attempts,
                };
            }
            info!(asset_id = %asset.id, stage = %field, uri = %uri, "Stage completed");
            let patch = AssetPatch {
                asset_id: asset.id.clone(),
                field,
                uri: uri.clone(),
            };
            if patches.send(patch).is_err() {
                debug!(stage = %field, "Patch receiver gone");
            }
        }

        StageReport {
            field,
            outcome,
            attempts,
        }
    }
}

async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), DomainError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic::write_atomic(&target, &bytes))
        .await
        .map_err(|e| DomainError::InternalError(format!("Writer task failed: {}", e)))?
        .map_err(|e| DomainError::ProcessingError(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests;
