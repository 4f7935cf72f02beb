//! File-backed draft storage
//!
//! One JSON file per draft inside a directory. Saves write a temporary file
//! and rename it over the record, so a crash leaves either the old or the new
//! draft but never a torn one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};
use veilform_core::FormId;

use crate::DraftStore;
use crate::draft::{Draft, DraftKey};
use crate::error::StorageError;
use crate::quota::DraftQuota;

/// Extension of in-progress writes
const TEMP_EXTENSION: &str = "tmp";

/// Persistent implementation of DraftStore
#[derive(Debug)]
pub struct FileDraftStore {
    /// Directory holding the draft files
    storage_path: PathBuf,
    /// Quota for record size and count
    quota: DraftQuota,
    /// Distinguishes concurrent temporary files
    write_counter: AtomicU64,
    /// Whether to fsync before renaming
    sync_writes: bool,
}

impl FileDraftStore {
    /// Open (creating if needed) a draft store in the given directory
    pub async fn new(storage_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_options(storage_path, DraftQuota::default(), true).await
    }

    /// Open with a custom quota and sync option
    pub async fn with_options(
        storage_path: impl AsRef<Path>,
        quota: DraftQuota,
        sync_writes: bool,
    ) -> Result<Self, StorageError> {
        let storage_path = storage_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&storage_path).await?;

        let store = Self {
            storage_path,
            quota,
            write_counter: AtomicU64::new(0),
            sync_writes,
        };
        store.remove_stale_temp_files().await;

        debug!(path = ?store.storage_path, "Opened draft store");
        Ok(store)
    }

    /// Directory holding the draft files
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn record_path(&self, key: &DraftKey) -> PathBuf {
        self.storage_path.join(key.file_name())
    }

    fn temp_path(&self, key: &DraftKey) -> PathBuf {
        let n = self.write_counter.fetch_add(1, Ordering::Relaxed);
        self.storage_path.join(format!(
            "{}.{}.{}.{}",
            key.file_name(),
            std::process::id(),
            n,
            TEMP_EXTENSION
        ))
    }

    /// Count stored draft records
    pub async fn record_count(&self) -> Result<usize, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.storage_path).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if is_record_file(&entry.file_name().to_string_lossy()) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove temporary files left behind by an interrupted save
    async fn remove_stale_temp_files(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.storage_path).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("response-draft-") && name.ends_with(TEMP_EXTENSION) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(file = %name, error = %e, "Failed to remove stale temp file");
                }
            }
        }
    }
}

fn is_record_file(name: &str) -> bool {
    name.starts_with("response-draft-") && name.ends_with(".json")
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn save(&self, draft: &Draft) -> Result<(), StorageError> {
        let key = draft.key();
        let json = draft.to_json()?;
        let path = self.record_path(&key);

        let overwrite = tokio::fs::try_exists(&path).await?;
        let current = if overwrite { 0 } else { self.record_count().await? };
        self.quota.check(json.len(), current, overwrite)?;

        let temp = self.temp_path(&key);
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(json.as_bytes()).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        trace!(key = %key, bytes = json.len(), "Saved draft");
        Ok(())
    }

    async fn load(&self, form_id: &FormId) -> Result<Option<Draft>, StorageError> {
        let key = DraftKey::for_form(form_id);
        match tokio::fs::read_to_string(self.record_path(&key)).await {
            Ok(json) => Ok(Some(Draft::from_json(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, form_id: &FormId) -> Result<(), StorageError> {
        let key = DraftKey::for_form(form_id);
        match tokio::fs::remove_file(self.record_path(&key)).await {
            Ok(()) => {
                debug!(key = %key, "Deleted draft");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, form_id: &FormId) -> Result<bool, StorageError> {
        let key = DraftKey::for_form(form_id);
        Ok(tokio::fs::try_exists(self.record_path(&key)).await?)
    }
}
