//! FFprobe adapter for media file probing
//!
//! Runs `ffprobe -print_format json -show_format -show_streams` and maps the
//! report onto [`MediaProbe`].

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Top-level ffprobe JSON output
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: Option<FfprobeFormat>,
}

/// A single stream from ffprobe output
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

/// FFprobe-based probe adapter
pub struct FFprobeAdapter {
    ffprobe_bin: String,
}

impl FFprobeAdapter {
    /// Create new FFprobe adapter running `ffprobe_bin`
    pub fn new(ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    async fn run(&self, path: &Path) -> Result<FfprobeOutput, DomainError> {
        let output = tokio::process::Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DomainError::ProcessingError(format!("Failed to run {}: {}", self.ffprobe_bin, e))
            })?;

        if !output.status.success() {
            return Err(DomainError::InvalidMedia(format!(
                "ffprobe could not read {} (exit code {:?}): {}",
                path.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice::<FfprobeOutput>(&output.stdout).map_err(|e| {
            DomainError::ProcessingError(format!("Failed to parse ffprobe output: {}", e))
        })
    }
}

#[async_trait]
impl ProbePort for FFprobeAdapter {
    async fn probe_media(&self, path: &Path) -> Result<MediaProbe, DomainError> {
        if !path.exists() {
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }
        let report = self.run(path).await?;
        let probe = media_probe_from(&report);
        debug!(
            path = %path.display(),
            duration_s = probe.duration_s,
            has_video = probe.has_video,
            has_audio = probe.has_audio,
            "Probed media"
        );
        Ok(probe)
    }
}

/// Map an ffprobe report onto the fields the editor needs
pub fn media_probe_from(report: &FfprobeOutput) -> MediaProbe {
    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = report
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let format_duration = report
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);
    let stream_duration = report
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    let frame_rate = video
        .and_then(|v| {
            v.avg_frame_rate
                .as_deref()
                .and_then(parse_rational)
                .or_else(|| v.r_frame_rate.as_deref().and_then(parse_rational))
        })
        .unwrap_or(0.0);

    MediaProbe {
        duration_s: format_duration.or(stream_duration).unwrap_or(0.0),
        frame_rate,
        has_video: video.is_some(),
        has_audio,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
    }
}

fn parse_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parse "num/den" (or a plain number) into frames per second
pub fn parse_rational(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "avg_frame_rate": "0/0", "duration": "12.480"},
            {"index": 1, "codec_type": "audio", "sample_rate": "48000", "duration": "12.500"}
        ],
        "format": {"duration": "12.512000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
    }"#;

    #[test]
    fn test_maps_report() {
        let report: FfprobeOutput = serde_json::from_str(REPORT).unwrap();
        let probe = media_probe_from(&report);
        assert_eq!(probe.duration_s, 12.512);
        assert!((probe.frame_rate - 29.97).abs() < 0.01);
        assert!(probe.has_video && probe.has_audio);
        assert_eq!((probe.width, probe.height), (1920, 1080));
    }

    #[test]
    fn test_audio_only_uses_stream_duration() {
        let report: FfprobeOutput = serde_json::from_str(
            r#"{"streams": [{"codec_type": "audio", "duration": "3.25"}], "format": {}}"#,
        )
        .unwrap();
        let probe = media_probe_from(&report);
        assert!(!probe.has_video);
        assert!(probe.has_audio);
        assert_eq!(probe.duration_s, 3.25);
        assert_eq!(probe.frame_rate, 0.0);
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("25/1"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("24"), Some(24.0));
        assert_eq!(parse_rational("x"), None);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let adapter = FFprobeAdapter::new("ffprobe");
        let result = adapter.probe_media(Path::new("/no/such/clip.mp4")).await;
        assert!(matches!(result, Err(DomainError::FileNotFound(_))));
    }
}
