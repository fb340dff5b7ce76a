//! Crash-safe file replacement

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Create an empty temp file next to `target`, so a later rename stays on one filesystem
pub fn temp_beside(target: &Path) -> std::io::Result<NamedTempFile> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)
}

/// Flush a filled temp file to disk and move it over `target`
pub fn persist(temp: NamedTempFile, target: &Path) -> std::io::Result<()> {
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Replace `target` with `bytes`; readers see either the old or the new content
pub fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut temp = temp_beside(target)?;
    temp.write_all(bytes)?;
    persist(temp, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_residue() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("file.json");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        let entries: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
