//! Quota management for draft storage
//!
//! Local storage is bounded (browser storage quotas, small devices). The
//! quota limits the size of one record and the number of records kept.

use crate::error::{StorageError, StorageResult};

/// Limits applied to draft records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftQuota {
    /// Maximum serialized size of one draft in bytes
    max_record_bytes: usize,
    /// Maximum number of drafts kept
    max_records: usize,
}

impl Default for DraftQuota {
    fn default() -> Self {
        Self {
            max_record_bytes: 5 * 1024 * 1024,
            max_records: 1000,
        }
    }
}

impl DraftQuota {
    /// Create a quota with specified limits
    pub fn new(max_record_bytes: usize, max_records: usize) -> Self {
        Self {
            max_record_bytes,
            max_records,
        }
    }

    /// Quota that never rejects a save
    pub fn unlimited() -> Self {
        Self::new(usize::MAX, usize::MAX)
    }

    /// Get the maximum record size
    pub fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Get the maximum number of records
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Check whether a save fits
    ///
    /// Overwriting an existing record never counts against the record limit.
    pub fn check(
        &self,
        record_bytes: usize,
        current_records: usize,
        overwrite: bool,
    ) -> StorageResult<()> {
        if record_bytes > self.max_record_bytes {
            return Err(StorageError::capacity_exceeded(format!(
                "draft is {} bytes (limit {})",
                record_bytes, self.max_record_bytes
            )));
        }
        if !overwrite && current_records >= self.max_records {
            return Err(StorageError::capacity_exceeded(format!(
                "{} drafts stored (limit {})",
                current_records, self.max_records
            )));
        }
        Ok(())
    }
}

/// Builder for DraftQuota
#[derive(Debug, Default)]
pub struct DraftQuotaBuilder {
    max_record_bytes: Option<usize>,
    max_records: Option<usize>,
}

impl DraftQuotaBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum record size in bytes
    pub fn max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = Some(max);
        self
    }

    /// Set maximum number of records
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    /// Build the DraftQuota
    pub fn build(self) -> DraftQuota {
        let mut quota = DraftQuota::default();

        if let Some(max) = self.max_record_bytes {
            quota.max_record_bytes = max;
        }
        if let Some(max) = self.max_records {
            quota.max_records = max;
        }

        quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quota() {
        let quota = DraftQuota::default();
        assert_eq!(quota.max_record_bytes(), 5 * 1024 * 1024);
        assert_eq!(quota.max_records(), 1000);
    }

    #[test]
    fn test_record_size_limit() {
        let quota = DraftQuota::new(100, 10);
        assert!(quota.check(100, 0, false).is_ok());
        assert!(matches!(
            quota.check(101, 0, false),
            Err(StorageError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn test_record_count_limit() {
        let quota = DraftQuota::new(100, 2);
        assert!(quota.check(10, 1, false).is_ok());
        assert!(quota.check(10, 2, false).is_err());
        // Overwrites do not add a record
        assert!(quota.check(10, 2, true).is_ok());
    }

    #[test]
    fn test_builder() {
        let quota = DraftQuotaBuilder::new().max_records(3).build();
        assert_eq!(quota.max_records(), 3);
        assert_eq!(quota.max_record_bytes(), DraftQuota::default().max_record_bytes());
    }

    #[test]
    fn test_unlimited() {
        assert!(DraftQuota::unlimited().check(usize::MAX, usize::MAX - 1, false).is_ok());
    }
}
