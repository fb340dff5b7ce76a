// Probe LibAV adapter - Media file analysis through the libav bindings

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_next::media::Type;
use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// LibAV-based media probing adapter
pub struct ProbeLibavAdapter;

impl ProbeLibavAdapter {
    /// Create new LibAV probing adapter, initializing libav once
    pub fn new() -> Result<Self, DomainError> {
        ffmpeg_next::init()
            .map_err(|e| DomainError::InternalError(format!("FFmpeg initialization failed: {}", e)))?;
        Ok(Self)
    }
}

fn rational_to_f64(rate: ffmpeg_next::Rational) -> f64 {
    if rate.denominator() == 0 {
        0.0
    } else {
        rate.numerator() as f64 / rate.denominator() as f64
    }
}

/// Blocking probe; run off the async executor
pub(crate) fn probe_blocking(path: &Path) -> Result<MediaProbe, DomainError> {
    let ictx = ffmpeg_next::format::input(&path).map_err(|e| {
        DomainError::InvalidMedia(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let duration_s = if ictx.duration() > 0 {
        ictx.duration() as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };
    let has_audio = ictx.streams().best(Type::Audio).is_some();

    let (has_video, frame_rate, width, height) = match ictx.streams().best(Type::Video) {
        Some(stream) => {
            let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|e| DomainError::InvalidMedia(format!("Unreadable video stream: {}", e)))?;
            (
                true,
                rational_to_f64(stream.avg_frame_rate()),
                decoder.width(),
                decoder.height(),
            )
        }
        None => (false, 0.0, 0, 0),
    };

    Ok(MediaProbe {
        duration_s,
        frame_rate,
        has_video,
        has_audio,
        width,
        height,
    })
}

#[async_trait]
impl ProbePort for ProbeLibavAdapter {
    async fn probe_media(&self, path: &Path) -> Result<MediaProbe, DomainError> {
        if !path.exists() {
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }
        let owned: PathBuf = path.to_path_buf();
        let probe = tokio::task::spawn_blocking(move || probe_blocking(&owned))
            .await
            .map_err(|e| DomainError::InternalError(format!("Probe task failed: {}", e)))??;
        debug!(path = %path.display(), duration_s = probe.duration_s, "Probed media via libav");
        Ok(probe)
    }
}
