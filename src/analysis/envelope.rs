//! Loudness envelope: windowed RMS normalized to `[0, 1]`

use serde::{Deserialize, Serialize};

/// Samples per RMS window unless configured otherwise
pub const DEFAULT_WINDOW: usize = 1024;

/// Smallest window accepted
pub const MIN_WINDOW: usize = 256;

/// Rate the audio is resampled to before windowing
pub const ENVELOPE_SAMPLE_RATE: u32 = 16_000;

/// Stored waveform resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformEnvelope {
    pub window: usize,
    pub sample_rate: u32,
    pub values: Vec<f32>,
}

impl WaveformEnvelope {
    /// Envelope for a source without (readable) audio
    pub fn empty(window: usize, sample_rate: u32) -> Self {
        Self {
            window: effective_window(window),
            sample_rate,
            values: Vec::new(),
        }
    }

    /// Compute the envelope of mono `samples`
    pub fn from_samples(samples: &[f32], window: usize, sample_rate: u32) -> Self {
        let window = effective_window(window);
        Self {
            window,
            sample_rate,
            values: rms_envelope(samples, window),
        }
    }

    /// Seconds of audio covered by one bucket
    pub fn bucket_duration_s(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.window as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Apply the window floor
pub fn effective_window(window: usize) -> usize {
    window.max(MIN_WINDOW)
}

/// RMS energy per window (the last window may be partial), divided by the
/// largest bucket. Silence stays all-zero.
pub fn rms_envelope(samples: &[f32], window: usize) -> Vec<f32> {
    let window = effective_window(window);
    let mut buckets: Vec<f32> = samples
        .chunks(window)
        .map(|chunk| {
            let energy: f64 = chunk
                .iter()
                .map(|&s| if s.is_finite() { s as f64 * s as f64 } else { 0.0 })
                .sum();
            (energy / chunk.len() as f64).sqrt() as f32
        })
        .collect();

    let peak = buckets.iter().copied().fold(0.0_f32, f32::max);
    if peak > 0.0 {
        for value in &mut buckets {
            *value = (*value / peak).clamp(0.0, 1.0);
        }
    }
    buckets
}
