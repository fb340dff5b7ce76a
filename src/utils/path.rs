//! Path utilities for the application-private storage area

use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory
pub const APP_DIR_NAME: &str = "reelcut";

/// Path utilities for locating drafts and derived media
pub struct PathUtils;

impl PathUtils {
    /// Create a new path utils instance
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PathUtils {
    fn default() -> Self {
        Self::new()
    }
}

impl PathUtils {
    /// Platform data directory for the application.
    ///
    /// `XDG_DATA_HOME`, then `%LOCALAPPDATA%`, then `~/.local/share`, and
    /// finally a directory next to the working directory.
    pub fn default_data_root(&self) -> PathBuf {
        let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());

        if let Some(xdg) = non_empty("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Some(local) = non_empty("LOCALAPPDATA") {
            return PathBuf::from(local).join(APP_DIR_NAME);
        }
        if let Some(home) = non_empty("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join(APP_DIR_NAME);
        }
        PathBuf::from(format!(".{}", APP_DIR_NAME))
    }

    /// Directory holding draft snapshots
    pub fn drafts_dir(&self, root: &Path) -> PathBuf {
        root.join("drafts")
    }

    /// Directory holding derived resources for one asset
    pub fn derived_dir(&self, root: &Path, asset_id: &str) -> PathBuf {
        root.join("derived").join(sanitize_file_name(asset_id))
    }

    /// Get file stem (name without extension) from path
    pub fn get_stem(&self, path: &str) -> Option<String> {
        Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
    }

    /// Resolve a source path to an absolute location URI stored on the asset
    pub fn to_location(&self, path: &Path) -> String {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        absolute.to_string_lossy().to_string()
    }
}

/// Keep ids usable as file names: anything outside `[A-Za-z0-9_-]` becomes `_`
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("abc-123_x"), "abc-123_x");
        assert_eq!(sanitize_file_name("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_file_name(""), "_");
    }

    #[test]
    fn test_layout() {
        let utils = PathUtils::new();
        let root = Path::new("/data");
        assert_eq!(utils.drafts_dir(root), PathBuf::from("/data/drafts"));
        assert_eq!(
            utils.derived_dir(root, "a/b"),
            PathBuf::from("/data/derived/a_b")
        );
        assert_eq!(utils.get_stem("/x/lap-chole.mp4").as_deref(), Some("lap-chole"));
    }

    #[test]
    fn test_absolute_location_is_kept() {
        let utils = PathUtils::new();
        assert_eq!(utils.to_location(Path::new("/videos/a.mp4")), "/videos/a.mp4");
    }
}
