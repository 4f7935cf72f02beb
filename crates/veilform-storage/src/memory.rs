//! In-memory draft storage
//!
//! Suitable for tests and for embedding where the host owns persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};
use veilform_core::FormId;

use crate::DraftStore;
use crate::draft::{Draft, DraftKey};
use crate::error::StorageError;
use crate::quota::DraftQuota;

/// In-memory implementation of DraftStore
///
/// Records are kept in their serialized form so the quota applies to the
/// same bytes a persistent store would write.
#[derive(Debug)]
pub struct InMemoryDraftStore {
    /// Map from draft key to serialized draft
    records: DashMap<DraftKey, String>,
    /// Quota for record size and count
    quota: DraftQuota,
}

impl Default for InMemoryDraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDraftStore {
    /// Create a new in-memory draft store
    pub fn new() -> Self {
        Self::with_quota(DraftQuota::default())
    }

    /// Create with a custom quota
    pub fn with_quota(quota: DraftQuota) -> Self {
        Self {
            records: DashMap::new(),
            quota,
        }
    }

    /// Number of stored drafts
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no drafts are stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a reference to the quota
    pub fn quota(&self) -> &DraftQuota {
        &self.quota
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save(&self, draft: &Draft) -> Result<(), StorageError> {
        let key = draft.key();
        let json = draft.to_json()?;

        let overwrite = self.records.contains_key(&key);
        self.quota.check(json.len(), self.records.len(), overwrite)?;

        trace!(key = %key, bytes = json.len(), "Saving draft");
        self.records.insert(key, json);
        Ok(())
    }

    async fn load(&self, form_id: &FormId) -> Result<Option<Draft>, StorageError> {
        let key = DraftKey::for_form(form_id);
        match self.records.get(&key) {
            Some(json) => Ok(Some(Draft::from_json(json.value())?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, form_id: &FormId) -> Result<(), StorageError> {
        let key = DraftKey::for_form(form_id);
        if self.records.remove(&key).is_some() {
            debug!(key = %key, "Deleted draft");
        }
        Ok(())
    }

    async fn contains(&self, form_id: &FormId) -> Result<bool, StorageError> {
        Ok(self.records.contains_key(&DraftKey::for_form(form_id)))
    }
}
