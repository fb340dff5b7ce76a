//! Thumbnail sprite sampling plan and grid compositing

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

/// Seconds between sampled frames unless configured otherwise
pub const DEFAULT_INTERVAL_S: f64 = 2.0;

/// Smallest sampling interval accepted
pub const MIN_INTERVAL_S: f64 = 0.5;

/// Widest grid
pub const MAX_COLUMNS: u32 = 4;

/// Widest tile in pixels
pub const MAX_TILE_WIDTH: u32 = 320;

/// Upper bound on tiles in one sprite; longer sources sample more sparsely
pub const MAX_FRAMES: usize = 240;

/// Grid geometry of a composited sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl SpriteLayout {
    /// Grid for `frame_count` tiles with at most `max_columns` per row
    pub fn for_frames(frame_count: usize, max_columns: u32, tile_width: u32, tile_height: u32) -> Self {
        let frame_count = frame_count.max(1) as u32;
        let columns = max_columns.clamp(1, MAX_COLUMNS).min(frame_count);
        let rows = frame_count.div_ceil(columns);
        Self {
            columns,
            rows,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.columns * self.tile_width
    }

    pub fn height(&self) -> u32 {
        self.rows * self.tile_height
    }

    /// Top-left pixel of tile `index`
    pub fn origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (
            (index % self.columns) * self.tile_width,
            (index / self.columns) * self.tile_height,
        )
    }
}

/// Sidecar describing which source time each tile shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteManifest {
    pub layout: SpriteLayout,
    pub interval_s: f64,
    pub frame_times_s: Vec<f64>,
}

impl SpriteManifest {
    /// Tile index showing source time `at_s`
    pub fn tile_for(&self, at_s: f64) -> usize {
        self.frame_times_s
            .iter()
            .rposition(|&t| t <= at_s + 1e-9)
            .unwrap_or(0)
    }
}

/// Apply the interval floor and widen it so a long source stays under [`MAX_FRAMES`]
pub fn effective_interval(duration_s: f64, interval_s: f64) -> f64 {
    let interval = if interval_s.is_finite() {
        interval_s.max(MIN_INTERVAL_S)
    } else {
        DEFAULT_INTERVAL_S
    };
    if duration_s.is_finite() && duration_s / interval > MAX_FRAMES as f64 {
        duration_s / MAX_FRAMES as f64
    } else {
        interval
    }
}

/// Times to sample: `0, i, 2i, ...` strictly before the end. Always holds at least `0.0`.
pub fn sample_times(duration_s: f64, interval_s: f64) -> Vec<f64> {
    let interval = effective_interval(duration_s, interval_s);
    let mut times = vec![0.0];
    if !duration_s.is_finite() {
        return times;
    }
    let mut index = 1;
    loop {
        let t = index as f64 * interval;
        if t >= duration_s || times.len() >= MAX_FRAMES {
            break;
        }
        times.push(t);
        index += 1;
    }
    times
}

/// Tile size for frames of `width` x `height` scaled to at most `tile_width` wide
pub fn tile_size(width: u32, height: u32, tile_width: u32) -> (u32, u32) {
    let tile_width = tile_width.clamp(1, MAX_TILE_WIDTH).min(width.max(1));
    if width == 0 || height == 0 {
        return (tile_width, (tile_width * 9 / 16).max(1));
    }
    let tile_height = ((height as f64 * tile_width as f64 / width as f64).round() as u32).max(1);
    (tile_width, tile_height)
}

/// Composite `frames` into a grid, left to right then top to bottom.
///
/// Tile size follows the first frame; other frames are stretched to it.
/// Returns `None` for an empty frame list.
pub fn compose(frames: &[RgbImage], tile_width: u32, max_columns: u32) -> Option<(RgbImage, SpriteLayout)> {
    let first = frames.first()?;
    let (tw, th) = tile_size(first.width(), first.height(), tile_width);
    let layout = SpriteLayout::for_frames(frames.len(), max_columns, tw, th);

    let mut sprite = RgbImage::new(layout.width(), layout.height());
    for (index, frame) in frames.iter().enumerate() {
        let (x, y) = layout.origin(index);
        if frame.width() == tw && frame.height() == th {
            imageops::replace(&mut sprite, frame, x as i64, y as i64);
        } else {
            let tile = imageops::resize(frame, tw, th, imageops::FilterType::Triangle);
            imageops::replace(&mut sprite, &tile, x as i64, y as i64);
        }
    }
    Some((sprite, layout))
}
