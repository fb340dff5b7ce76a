//! Application configuration
//!
//! Every section has working defaults, so an empty (or absent) TOML file is
//! a valid configuration. Loading and layering lives in
//! [`crate::adapters::toml_config`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{envelope, sprite};
use crate::domain::rules::{MarkerSplitPolicy, DEFAULT_SNAP_RADIUS_S};
use crate::ports::ProxySettings;
use crate::utils::logging::LoggingConfig;
use crate::utils::path::PathUtils;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub editor: EditorConfig,
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// `[editor]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Seconds within which In/Out/split points snap
    pub snap_radius_s: f64,
    /// Undo entries kept before the oldest is dropped
    pub undo_limit: usize,
    /// Quiet period before a snapshot is written
    pub autosave_debounce_ms: u64,
    /// Whether deletes close the gap by default
    pub ripple_default: bool,
    pub marker_split_policy: MarkerSplitPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_radius_s: DEFAULT_SNAP_RADIUS_S,
            undo_limit: 100,
            autosave_debounce_ms: 600,
            ripple_default: true,
            marker_split_policy: MarkerSplitPolicy::KeepOnFirst,
        }
    }
}

/// `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub thumbnail_interval_s: f64,
    pub sprite_columns: u32,
    pub tile_width: u32,
    pub waveform_window: usize,
    pub proxy_height: u32,
    pub proxy_crf: u8,
    /// Attempts per stage, including the first
    pub max_attempts: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thumbnail_interval_s: sprite::DEFAULT_INTERVAL_S,
            sprite_columns: sprite::MAX_COLUMNS,
            tile_width: sprite::MAX_TILE_WIDTH,
            waveform_window: envelope::DEFAULT_WINDOW,
            proxy_height: 720,
            proxy_crf: 28,
            max_attempts: 2,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            max_height: self.proxy_height,
            crf: self.proxy_crf,
            ..ProxySettings::default()
        }
    }
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of drafts and derived media; the platform data dir when unset
    pub root: Option<PathBuf>,
}

impl ReelConfig {
    /// Bring out-of-range values back to their floors and caps
    pub fn normalize(&mut self) {
        let editor = &mut self.editor;
        if !editor.snap_radius_s.is_finite() || editor.snap_radius_s < 0.0 {
            editor.snap_radius_s = DEFAULT_SNAP_RADIUS_S;
        }
        editor.undo_limit = editor.undo_limit.max(1);

        let pipeline = &mut self.pipeline;
        if !pipeline.thumbnail_interval_s.is_finite() {
            pipeline.thumbnail_interval_s = sprite::DEFAULT_INTERVAL_S;
        }
        pipeline.thumbnail_interval_s = pipeline.thumbnail_interval_s.max(sprite::MIN_INTERVAL_S);
        pipeline.sprite_columns = pipeline.sprite_columns.clamp(1, sprite::MAX_COLUMNS);
        pipeline.tile_width = pipeline.tile_width.clamp(16, sprite::MAX_TILE_WIDTH);
        pipeline.waveform_window = envelope::effective_window(pipeline.waveform_window);
        pipeline.proxy_crf = pipeline.proxy_crf.min(51);
        pipeline.max_attempts = pipeline.max_attempts.max(1);
    }

    /// Reject values normalization cannot repair
    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.proxy_height < 144 || self.pipeline.proxy_height % 2 != 0 {
            return Err(format!(
                "pipeline.proxy_height must be an even number of at least 144 (got {})",
                self.pipeline.proxy_height
            ));
        }
        if self.pipeline.ffmpeg_bin.trim().is_empty() || self.pipeline.ffprobe_bin.trim().is_empty() {
            return Err("pipeline.ffmpeg_bin and pipeline.ffprobe_bin cannot be empty".to_string());
        }
        if let Some(root) = &self.store.root {
            if root.as_os_str().is_empty() {
                return Err("store.root cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Resolved storage root
    pub fn store_root(&self) -> PathBuf {
        self.store
            .root
            .clone()
            .unwrap_or_else(|| PathUtils::new().default_data_root())
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.editor.autosave_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReelConfig::default();
        assert_eq!(config.editor.snap_radius_s, 0.18);
        assert_eq!(config.editor.undo_limit, 100);
        assert_eq!(config.autosave_debounce(), Duration::from_millis(600));
        assert_eq!(config.pipeline.thumbnail_interval_s, 2.0);
        assert_eq!(config.pipeline.waveform_window, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalize_applies_floors_and_caps() {
        let mut config = ReelConfig::default();
        config.pipeline.thumbnail_interval_s = 0.1;
        config.pipeline.waveform_window = 10;
        config.pipeline.sprite_columns = 12;
        config.pipeline.tile_width = 1024;
        config.pipeline.max_attempts = 0;
        config.editor.snap_radius_s = f64::NAN;
        config.normalize();

        assert_eq!(config.pipeline.thumbnail_interval_s, 0.5);
        assert_eq!(config.pipeline.waveform_window, 256);
        assert_eq!(config.pipeline.sprite_columns, 4);
        assert_eq!(config.pipeline.tile_width, 320);
        assert_eq!(config.pipeline.max_attempts, 1);
        assert_eq!(config.editor.snap_radius_s, DEFAULT_SNAP_RADIUS_S);
    }

    #[test]
    fn test_validate_rejects_odd_proxy_height() {
        let mut config = ReelConfig::default();
        config.pipeline.proxy_height = 721;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_proxy_settings_follow_pipeline() {
        let mut config = ReelConfig::default();
        config.pipeline.proxy_height = 480;
        let settings = config.pipeline.proxy_settings();
        assert_eq!(settings.max_height, 480);
        assert_eq!(settings.crf, 28);
        assert!(settings.threads >= 1);
    }
}
