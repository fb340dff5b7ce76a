//! FFmpeg execution adapter
//!
//! Decodes stills and audio and writes proxies by running the `ffmpeg`
//! executable. Child processes are killed when the awaiting future is
//! dropped, so a cancelled pipeline stage does not leave encoders behind.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::ports::*;

/// FFmpeg-based decode and transcode adapter
pub struct FFmpegAdapter {
    ffmpeg_bin: String,
}

impl FFmpegAdapter {
    /// Create new FFmpeg adapter running `ffmpeg_bin`
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, DomainError> {
        debug!(bin = %self.ffmpeg_bin, args = ?args, "Running ffmpeg");
        tokio::process::Command::new(&self.ffmpeg_bin)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DomainError::ProcessingError(format!("Failed to run {}: {}", self.ffmpeg_bin, e)))
    }
}

fn ensure_exists(path: &Path) -> Result<(), DomainError> {
    if path.exists() {
        Ok(())
    } else {
        Err(DomainError::FileNotFound(path.display().to_string()))
    }
}

fn failure(what: &str, output: &Output) -> DomainError {
    DomainError::ProcessingError(format!(
        "{} failed (exit code {:?}): {}",
        what,
        output.status.code(),
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

/// Whether ffmpeg's complaint means the input simply has no audio
fn reports_missing_audio(stderr: &str) -> bool {
    stderr.contains("matches no streams") || stderr.contains("does not contain any stream")
}

/// Reinterpret raw little-endian f32 PCM
pub fn pcm_f32le_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[async_trait]
impl DecodePort for FFmpegAdapter {
    async fn extract_frame(
        &self,
        path: &Path,
        at_s: f64,
        max_width: u32,
    ) -> Result<RgbImage, DomainError> {
        ensure_exists(path)?;
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", at_s.max(0.0)),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale='min({},iw)':-2", max_width.max(2)),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "-".to_string(),
        ];
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(failure("Frame extraction", &output));
        }
        if output.stdout.is_empty() {
            return Err(DomainError::ProcessingError(format!(
                "No frame decoded at {:.3}s",
                at_s
            )));
        }
        let frame = image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map_err(|e| DomainError::ProcessingError(format!("Undecodable frame: {}", e)))?;
        Ok(frame.to_rgb8())
    }

    async fn read_audio_mono(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<Option<Vec<f32>>, DomainError> {
        ensure_exists(path)?;
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-f".to_string(),
            "f32le".to_string(),
            "-".to_string(),
        ];
        let output = self.run(args).await?;
        if !output.status.success() {
            if reports_missing_audio(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(None);
            }
            return Err(failure("Audio decode", &output));
        }
        Ok(Some(pcm_f32le_to_samples(&output.stdout)))
    }
}

#[async_trait]
impl TranscodePort for FFmpegAdapter {
    async fn transcode_proxy(
        &self,
        source: &Path,
        dest: &Path,
        settings: &ProxySettings,
    ) -> Result<(), DomainError> {
        ensure_exists(source)?;
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "0:a:0?".to_string(),
            "-vf".to_string(),
            format!("scale=-2:'min({},ih)'", settings.max_height),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            settings.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-threads".to_string(),
            settings.threads.to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", settings.audio_bitrate_kbps),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            dest.to_string_lossy().to_string(),
        ];
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(failure("Proxy transcode", &output));
        }
        info!(source = %source.display(), dest = %dest.display(), "Proxy written");
        Ok(())
    }
}
