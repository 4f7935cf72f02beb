//! Draft records
//!
//! A draft is the serialized answer set of a response that has not been
//! submitted yet. There is one record per form, overwritten on every save.

use std::fmt::{self, Display};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use veilform_core::{Answers, FormId};

use crate::error::{StorageError, StorageResult};

/// Namespaced key of a draft record: `response-draft:<formId>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey(String);

impl DraftKey {
    /// Namespace prefix of every draft key
    pub const PREFIX: &'static str = "response-draft:";

    /// Key of the draft for a form
    pub fn for_form(form_id: &FormId) -> Self {
        Self(format!("{}{}", Self::PREFIX, form_id))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form identifier the key belongs to
    pub fn form_id(&self) -> FormId {
        FormId::new(&self.0[Self::PREFIX.len()..])
    }

    /// File name safe on every platform
    ///
    /// Form identifiers are free-form, so the identifier is hex encoded.
    pub fn file_name(&self) -> String {
        format!(
            "response-draft-{}.json",
            hex::encode(&self.0[Self::PREFIX.len()..])
        )
    }
}

impl Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted, not yet submitted response snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub form_id: FormId,
    pub answers: Answers,
    /// Milliseconds since the Unix epoch when the snapshot was taken
    pub saved_at_millis: i64,
}

impl Draft {
    /// Snapshot an answer set now
    pub fn new(form_id: FormId, answers: Answers) -> Self {
        Self {
            form_id,
            answers,
            saved_at_millis: Utc::now().timestamp_millis(),
        }
    }

    /// Storage key of this draft
    pub fn key(&self) -> DraftKey {
        DraftKey::for_form(&self.form_id)
    }

    /// Serialize to the stored JSON form
    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Parse the stored JSON form
    pub fn from_json(json: &str) -> StorageResult<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_key_format() {
        let key = DraftKey::for_form(&FormId::new("abc123"));
        assert_eq!(key.as_str(), "response-draft:abc123");
        assert_eq!(key.form_id(), FormId::new("abc123"));
    }

    #[test]
    fn test_file_name_is_path_safe() {
        let key = DraftKey::for_form(&FormId::new("../etc/passwd"));
        let name = key.file_name();
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_draft_json_shape() {
        let mut answers = Answers::new();
        answers.insert("q1".to_string(), serde_json::json!("yes"));
        let draft = Draft {
            form_id: FormId::new("f1"),
            answers,
            saved_at_millis: 1_700_000_000_000,
        };

        let value: serde_json::Value = serde_json::from_str(&draft.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "formId": "f1",
                "answers": {"q1": "yes"},
                "savedAtMillis": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            Draft::from_json("{not json"),
            Err(StorageError::Deserialization(_))
        ));
    }
}
