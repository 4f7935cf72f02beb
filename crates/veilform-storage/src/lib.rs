//! # Veilform Storage
//!
//! Local persistence for response drafts.
//!
//! A draft lets a respondent survive a reload or a crash without a network
//! round-trip. There is exactly one record per form, keyed
//! `response-draft:<formId>`, holding the serialized answer set.
//!
//! ## Features
//!
//! - **DraftStore trait**: Abstraction over the local draft record
//! - **InMemoryDraftStore**: In-memory implementation for tests and embedding
//! - **FileDraftStore**: One JSON file per draft, written atomically
//! - **DraftQuota**: Size and count limits modelling local storage quotas
//!
//! ## Example
//!
//! ```rust,ignore
//! use veilform_core::{Answers, FormId};
//! use veilform_storage::{Draft, DraftStore, InMemoryDraftStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryDraftStore::new();
//!     let form_id = FormId::new("form-1");
//!
//!     store.save(&Draft::new(form_id.clone(), Answers::new())).await.unwrap();
//!     assert!(store.contains(&form_id).await.unwrap());
//!
//!     store.delete(&form_id).await.unwrap();
//!     assert!(store.load(&form_id).await.unwrap().is_none());
//! }
//! ```

pub mod draft;
pub mod error;
pub mod file;
pub mod memory;
pub mod quota;

// Re-exports
pub use draft::{Draft, DraftKey};
pub use error::{StorageError, StorageResult};
pub use file::FileDraftStore;
pub use memory::InMemoryDraftStore;
pub use quota::{DraftQuota, DraftQuotaBuilder};

use async_trait::async_trait;
use veilform_core::FormId;

/// Trait for the local draft record of each form
///
/// Saving overwrites the previous record for the same form; no history is
/// kept. Concurrent writers are not coordinated and the last write wins.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Save a draft, replacing any previous draft for the same form
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CapacityExceeded`] if the record does not fit
    /// the store's quota, or an I/O error.
    async fn save(&self, draft: &Draft) -> Result<(), StorageError>;

    /// Load the draft for a form, if one exists
    async fn load(&self, form_id: &FormId) -> Result<Option<Draft>, StorageError>;

    /// Delete the draft for a form
    ///
    /// Deleting a missing draft is not an error.
    async fn delete(&self, form_id: &FormId) -> Result<(), StorageError>;

    /// Check whether a draft exists for a form
    async fn contains(&self, form_id: &FormId) -> Result<bool, StorageError> {
        Ok(self.load(form_id).await?.is_some())
    }
}
