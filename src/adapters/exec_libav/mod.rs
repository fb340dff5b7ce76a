// Decode LibAV adapter - Stills and audio decoded in-process through libav

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_next::format::sample::Type as SampleLayout;
use ffmpeg_next::format::{Pixel, Sample};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg_next::util::frame::{audio::Audio as AudioFrame, video::Video as VideoFrame};
use image::RgbImage;
use tracing::debug;

use crate::domain::errors::*;
use crate::ports::*;

/// LibAV-based decode adapter
pub struct DecodeLibavAdapter;

impl DecodeLibavAdapter {
    pub fn new() -> Result<Self, DomainError> {
        ffmpeg_next::init()
            .map_err(|e| DomainError::InternalError(format!("FFmpeg initialization failed: {}", e)))?;
        Ok(Self)
    }
}

fn decode_error(what: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::ProcessingError(format!("{}: {}", what, e))
}

fn frame_to_rgb(frame: &VideoFrame, max_width: u32) -> Result<RgbImage, DomainError> {
    let (src_w, src_h) = (frame.width(), frame.height());
    let out_w = src_w.min(max_width.max(2));
    let out_h = ((src_h as f64 * out_w as f64 / src_w.max(1) as f64).round() as u32).max(1);

    let mut scaler = Scaler::get(
        frame.format(),
        src_w,
        src_h,
        Pixel::RGB24,
        out_w,
        out_h,
        Flags::BILINEAR,
    )
    .map_err(|e| decode_error("Failed to create scaler", e))?;
    let mut rgb = VideoFrame::empty();
    scaler
        .run(frame, &mut rgb)
        .map_err(|e| decode_error("Failed to convert frame", e))?;

    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = out_w as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * out_h as usize);
    for row in 0..out_h as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    RgbImage::from_raw(out_w, out_h, pixels)
        .ok_or_else(|| DomainError::InternalError("Frame buffer size mismatch".to_string()))
}

fn extract_frame_blocking(path: &Path, at_s: f64, max_width: u32) -> Result<RgbImage, DomainError> {
    let mut ictx = ffmpeg_next::format::input(&path)
        .map_err(|e| DomainError::InvalidMedia(format!("Failed to open {}: {}", path.display(), e)))?;
    let stream = ictx
        .streams()
        .best(Type::Video)
        .ok_or_else(|| DomainError::InvalidMedia(format!("{} has no video track", path.display())))?;
    let index = stream.index();
    let time_base = stream.time_base();
    let mut decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .and_then(|context| context.decoder().video())
        .map_err(|e| decode_error("Failed to create video decoder", e))?;

    let target = (at_s.max(0.0) * ffmpeg_next::ffi::AV_TIME_BASE as f64) as i64;
    ictx.seek(target, ..target)
        .map_err(|e| decode_error("Failed to seek", e))?;

    let to_seconds = |pts: i64| pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64;
    let mut frame = VideoFrame::empty();
    let mut last: Option<VideoFrame> = None;

    for (stream, packet) in ictx.packets() {
        if stream.index() != index {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| decode_error("Failed to decode packet", e))?;
        while decoder.receive_frame(&mut frame).is_ok() {
            let shown_at = frame.timestamp().map(to_seconds).unwrap_or(at_s);
            if shown_at + 1e-3 >= at_s {
                return frame_to_rgb(&frame, max_width);
            }
            last = Some(frame.clone());
        }
    }

    let _ = decoder.send_eof();
    while decoder.receive_frame(&mut frame).is_ok() {
        last = Some(frame.clone());
    }
    match last {
        Some(frame) => frame_to_rgb(&frame, max_width),
        None => Err(DomainError::ProcessingError(format!("No frame decoded at {:.3}s", at_s))),
    }
}

/// Average every channel of one decoded frame into mono samples
fn downmix(frame: &AudioFrame, channels: usize) -> Result<Vec<f32>, DomainError> {
    let samples = frame.samples();
    let channels = channels.max(1);
    let read_f32 = |bytes: &[u8], i: usize| f32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
    let read_i16 = |bytes: &[u8], i: usize| i16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]) as f32 / 32768.0;

    let mut mono = vec![0.0_f32; samples];
    match frame.format() {
        Sample::F32(SampleLayout::Planar) => {
            for ch in 0..channels {
                let plane = frame.data(ch);
                for (i, out) in mono.iter_mut().enumerate() {
                    *out += read_f32(plane, i);
                }
            }
        }
        Sample::F32(SampleLayout::Packed) => {
            let data = frame.data(0);
            for (i, out) in mono.iter_mut().enumerate() {
                for ch in 0..channels {
                    *out += read_f32(data, i * channels + ch);
                }
            }
        }
        Sample::I16(SampleLayout::Planar) => {
            for ch in 0..channels {
                let plane = frame.data(ch);
                for (i, out) in mono.iter_mut().enumerate() {
                    *out += read_i16(plane, i);
                }
            }
        }
        Sample::I16(SampleLayout::Packed) => {
            let data = frame.data(0);
            for (i, out) in mono.iter_mut().enumerate() {
                for ch in 0..channels {
                    *out += read_i16(data, i * channels + ch);
                }
            }
        }
        other => {
            return Err(DomainError::ProcessingError(format!(
                "Unsupported audio sample format {:?}",
                other
            )))
        }
    }
    for value in &mut mono {
        *value /= channels as f32;
    }
    Ok(mono)
}

/// Linear-interpolation resampler; enough for a loudness overview
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

fn read_audio_blocking(path: &Path, sample_rate: u32) -> Result<Option<Vec<f32>>, DomainError> {
    let mut ictx = ffmpeg_next::format::input(&path)
        .map_err(|e| DomainError::InvalidMedia(format!("Failed to open {}: {}", path.display(), e)))?;
    let Some(stream) = ictx.streams().best(Type::Audio) else {
        return Ok(None);
    };
    let index = stream.index();
    let mut decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .and_then(|context| context.decoder().audio())
        .map_err(|e| decode_error("Failed to create audio decoder", e))?;
    let source_rate = decoder.rate();
    let channels = decoder.ch_layout().channels() as usize;

    let mut mono = Vec::new();
    let mut frame = AudioFrame::empty();
    for (stream, packet) in ictx.packets() {
        if stream.index() != index {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| decode_error("Failed to decode audio packet", e))?;
        while decoder.receive_frame(&mut frame).is_ok() {
            mono.extend(downmix(&frame, channels)?);
        }
    }
    let _ = decoder.send_eof();
    while decoder.receive_frame(&mut frame).is_ok() {
        mono.extend(downmix(&frame, channels)?);
    }

    Ok(Some(resample_linear(&mono, source_rate, sample_rate)))
}

#[async_trait]
impl DecodePort for DecodeLibavAdapter {
    async fn extract_frame(
        &self,
        path: &Path,
        at_s: f64,
        max_width: u32,
    ) -> Result<RgbImage, DomainError> {
        if !path.exists() {
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }
        let owned: PathBuf = path.to_path_buf();
        let frame = tokio::task::spawn_blocking(move || extract_frame_blocking(&owned, at_s, max_width))
            .await
            .map_err(|e| DomainError::InternalError(format!("Decode task failed: {}", e)))??;
        debug!(path = %path.display(), at_s, width = frame.width(), "Frame decoded via libav");
        Ok(frame)
    }

    async fn read_audio_mono(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<Option<Vec<f32>>, DomainError> {
        if !path.exists() {
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_audio_blocking(&owned, sample_rate))
            .await
            .map_err(|e| DomainError::InternalError(format!("Decode task failed: {}", e)))?
    }
}
