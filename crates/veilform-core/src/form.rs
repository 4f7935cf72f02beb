//! Plaintext types carried by envelopes
//!
//! - [`FormDocument`] with [`FormParams`] metadata: a published form
//! - [`FormResponse`] with [`ResponseMeta`] metadata: one respondent's answers
//!
//! The form definition itself (pages, questions, theme) is opaque here; it is
//! produced and rendered by the form builder.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::{Access, Sealable};
use crate::identity::FormId;

/// Answers keyed by question key
pub type Answers = BTreeMap<String, serde_json::Value>;

/// An opaque form definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormDocument(pub serde_json::Value);

impl Sealable for FormDocument {
    type Meta = FormParams;
    const KIND: &'static str = "form";
}

/// Cleartext parameters of a published form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormParams {
    pub form_id: FormId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Account identifier of the form owner, invited to every response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_account: Option<String>,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub is_payable: bool,
    #[serde(default)]
    pub rate: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_number_of_response: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl FormParams {
    /// Parameters for an open, free, protected form
    pub fn new(form_id: FormId) -> Self {
        Self {
            form_id,
            title: None,
            description: None,
            owner_account: None,
            access: Access::default(),
            is_closed: false,
            is_payable: false,
            rate: 0,
            max_number_of_response: None,
            start_date: None,
            end_date: None,
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the owner's account identifier
    pub fn with_owner_account(mut self, account: impl Into<String>) -> Self {
        self.owner_account = Some(account.into());
        self
    }

    /// Set the access mode
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Set the response window
    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Set the price per response, negative values clamp to zero
    pub fn set_rate(&mut self, rate: i64) {
        self.rate = rate.max(0) as u64;
    }

    /// Set the response cap, negative values clamp to zero
    pub fn set_max_number_of_response(&mut self, max: i64) {
        self.max_number_of_response = Some(max.max(0) as u64);
    }

    /// Whether the form accepts new responses at `now`
    pub fn accepts_responses_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_closed {
            return false;
        }
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        true
    }
}

/// One respondent's answers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormResponse {
    #[serde(rename = "res")]
    pub answers: Answers,
}

impl FormResponse {
    /// Wrap an answer set
    pub fn new(answers: Answers) -> Self {
        Self { answers }
    }
}

impl Sealable for FormResponse {
    type Meta = ResponseMeta;
    const KIND: &'static str = "response";
}

/// Cleartext metadata of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub form_id: FormId,
    pub access: Access,
}
