// File draft store - Durable JSON snapshots, one file per draft

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;
use crate::utils::atomic;
use crate::utils::path::{sanitize_file_name, PathUtils};

/// Snapshot format written by this build
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct StoredDraftRef<'a> {
    format_version: u32,
    draft: &'a Draft,
}

#[derive(Deserialize)]
struct StoredDraft {
    format_version: u32,
    draft: Draft,
}

/// Draft store writing `<root>/drafts/<draft-id>.json`.
///
/// Writes for one id are serialized; different ids proceed in parallel.
pub struct FileDraftStore {
    dir: PathBuf,
    locks: Mutex<HashMap<DraftId, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileDraftStore {
    /// Create a store under `root`; the directory is created on first write
    pub fn new(root: &Path) -> Self {
        Self {
            dir: PathUtils::new().drafts_dir(root),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of a draft's snapshot
    pub fn path_for(&self, id: &DraftId) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_name(id.as_str())))
    }

    fn lock_for(&self, id: &DraftId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id.clone()).or_default())
    }
}

fn persistence(action: &str, path: &Path, e: impl std::fmt::Display) -> DomainError {
    DomainError::PersistenceError(format!("{} {}: {}", action, path.display(), e))
}

/// Decode a stored snapshot and restore its invariants
pub fn decode_snapshot(bytes: &[u8]) -> Result<Draft, DomainError> {
    let stored: StoredDraft = serde_json::from_slice(bytes)?;
    if stored.format_version > FORMAT_VERSION {
        return Err(DomainError::PersistenceError(format!(
            "snapshot format {} is newer than supported format {}",
            stored.format_version, FORMAT_VERSION
        )));
    }
    let mut draft = stored.draft;
    draft.sanitize();
    Ok(draft)
}

/// Encode a draft in the current snapshot format
pub fn encode_snapshot(draft: &Draft) -> Result<Vec<u8>, DomainError> {
    Ok(serde_json::to_vec_pretty(&StoredDraftRef {
        format_version: FORMAT_VERSION,
        draft,
    })?)
}

#[async_trait]
impl DraftStorePort for FileDraftStore {
    async fn save_snapshot(&self, draft: &Draft) -> Result<(), DomainError> {
        // Non-finite times are clamped here; the encoder still refuses any that slip through
        let mut clean = draft.clone();
        clean.sanitize();
        let bytes = encode_snapshot(&clean)?;
        let path = self.path_for(&draft.id);

        let lock = self.lock_for(&draft.id);
        let _guard = lock.lock().await;

        let target = path.clone();
        tokio::task::spawn_blocking(move || atomic::write_atomic(&target, &bytes))
            .await
            .map_err(|e| DomainError::InternalError(format!("Snapshot writer panicked: {}", e)))?
            .map_err(|e| persistence("Failed to write", &path, e))?;

        debug!(draft_id = %draft.id, path = %path.display(), "Snapshot saved");
        Ok(())
    }

    async fn load_draft(&self, id: &DraftId) -> Result<Option<Draft>, DomainError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persistence("Failed to read", &path, e)),
        };

        let mut draft = decode_snapshot(&bytes)?;
        if &draft.id != id {
            warn!(draft_id = %id, stored_id = %draft.id, "Snapshot id does not match its file name");
            draft.id = id.clone();
        }
        debug!(draft_id = %id, segments = draft.segments.len(), "Snapshot loaded");
        Ok(Some(draft))
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), DomainError> {
        let path = self.path_for(id);
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(draft_id = %id, "Draft deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("Failed to delete", &path, e)),
        }
    }

    async fn list_drafts(&self) -> Result<Vec<DraftId>, DomainError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| persistence("Failed to list", &self.dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(DraftId::from(stem));
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}
