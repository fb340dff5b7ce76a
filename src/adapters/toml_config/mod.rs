// TOML config adapter - Layered configuration from file, environment and CLI

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ReelConfig;
use crate::domain::rules::MarkerSplitPolicy;
use crate::error::{ReelError, ReelResult};
use crate::utils::logging::{LogFormat, LogLevel};
use crate::utils::path::APP_DIR_NAME;

/// Prefix of the environment variables read by the adapter
pub const ENV_PREFIX: &str = "REELCUT_";

/// Values given on the command line; they win over everything else
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_root: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
}

/// TOML configuration adapter
pub struct TomlConfigAdapter {
    default_path: Option<PathBuf>,
}

impl TomlConfigAdapter {
    /// Create an adapter that falls back to the platform config file
    pub fn new() -> Self {
        Self {
            default_path: Self::default_config_path(),
        }
    }

    /// Create an adapter without a fallback config file
    pub fn without_default_file() -> Self {
        Self { default_path: None }
    }

    /// `$XDG_CONFIG_HOME/reelcut/config.toml`, `%APPDATA%\reelcut\config.toml`
    /// or `~/.config/reelcut/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());
        let dir = non_empty("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| non_empty("APPDATA").map(PathBuf::from))
            .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(dir.join(APP_DIR_NAME).join("config.toml"))
    }

    /// Build the effective configuration from the process environment
    pub fn load(&self, file: Option<&Path>, overrides: &ConfigOverrides) -> ReelResult<ReelConfig> {
        self.load_with_env(file, overrides, |key| std::env::var(key).ok())
    }

    /// Build the effective configuration: defaults < file < environment < CLI.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load_with_env<F>(
        &self,
        file: Option<&Path>,
        overrides: &ConfigOverrides,
        env: F,
    ) -> ReelResult<ReelConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => {
                if !path.exists() {
                    return Err(ReelError::ConfigError {
                        message: format!("Config file does not exist: {}", path.display()),
                    });
                }
                self.read_file(path)?
            }
            None => match self.default_path.as_deref().filter(|p| p.exists()) {
                Some(path) => self.read_file(path)?,
                None => ReelConfig::default(),
            },
        };

        self.apply_env(&mut config, env)?;
        apply_overrides(&mut config, overrides);

        config.normalize();
        config
            .validate()
            .map_err(|message| ReelError::ConfigError { message })?;

        debug!(store_root = %config.store_root().display(), "Configuration resolved");
        Ok(config)
    }

    /// Parse a configuration document
    pub fn parse_str(&self, content: &str) -> ReelResult<ReelConfig> {
        Ok(toml::from_str(content)?)
    }

    /// Render a configuration as TOML
    pub fn to_toml_string(&self, config: &ReelConfig) -> ReelResult<String> {
        toml::to_string_pretty(config).map_err(|e| ReelError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    fn read_file(&self, path: &Path) -> ReelResult<ReelConfig> {
        info!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    fn apply_env<F>(&self, config: &mut ReelConfig, env: F) -> ReelResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());

        if let Some(root) = var("STORE_ROOT") {
            config.store.root = Some(PathBuf::from(root));
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = parse_env("LOG_LEVEL", &level)?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.logging.format = parse_env("LOG_FORMAT", &format)?;
        }
        if let Some(radius) = var("SNAP_RADIUS_S") {
            config.editor.snap_radius_s = parse_env("SNAP_RADIUS_S", &radius)?;
        }
        if let Some(limit) = var("UNDO_LIMIT") {
            config.editor.undo_limit = parse_env("UNDO_LIMIT", &limit)?;
        }
        if let Some(debounce) = var("AUTOSAVE_DEBOUNCE_MS") {
            config.editor.autosave_debounce_ms = parse_env("AUTOSAVE_DEBOUNCE_MS", &debounce)?;
        }
        if let Some(policy) = var("MARKER_SPLIT_POLICY") {
            config.editor.marker_split_policy = match policy.trim() {
                "keep_on_first" => MarkerSplitPolicy::KeepOnFirst,
                "move_to_second" => MarkerSplitPolicy::MoveToSecond,
                other => {
                    return Err(ReelError::ConfigError {
                        message: format!("{}MARKER_SPLIT_POLICY: unknown policy '{}'", ENV_PREFIX, other),
                    })
                }
            };
        }
        if let Some(attempts) = var("MAX_ATTEMPTS") {
            config.pipeline.max_attempts = parse_env("MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(bin) = var("FFMPEG") {
            config.pipeline.ffmpeg_bin = bin;
        }
        if let Some(bin) = var("FFPROBE") {
            config.pipeline.ffprobe_bin = bin;
        }
        Ok(())
    }
}

impl Default for TomlConfigAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_overrides(config: &mut ReelConfig, overrides: &ConfigOverrides) {
    if let Some(root) = &overrides.store_root {
        config.store.root = Some(root.clone());
    }
    if let Some(level) = overrides.log_level {
        config.logging.level = level;
    }
    if let Some(format) = overrides.log_format {
        config.logging.format = format;
    }
}

fn parse_env<T>(name: &str, value: &str) -> ReelResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ReelError::ConfigError {
        message: format!("{}{}: {}", ENV_PREFIX, name, e),
    })
}
