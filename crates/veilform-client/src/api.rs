//! Wire types of the form storage service
//!
//! Every response is `{ data?: T, err?: string }`. A non-empty `err` wins
//! over any `data` that may accompany it.

use serde::{Deserialize, Serialize};
use veilform_core::{Access, Envelope, FormId, FormResponse};

use crate::error::{ClientError, ClientResult};

/// Response envelope used by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            err: None,
        }
    }

    /// A failed response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            err: Some(message.into()),
        }
    }

    /// Turn the response into its data, short-circuiting on `err`
    pub fn into_data(self) -> ClientResult<Option<T>> {
        match self.err {
            Some(err) if !err.is_empty() => Err(ClientError::Rejected(err)),
            _ => Ok(self.data),
        }
    }

    /// Like [`ApiResponse::into_data`], but absent data is an error
    pub fn require_data(self, what: &str) -> ClientResult<T> {
        self.into_data()?
            .ok_or_else(|| ClientError::decode(format!("{} response carried no data", what)))
    }
}

/// Login request; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eoa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Login result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Session token to present on later requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Account identifier of the logged in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eoa: Option<String>,
}

/// Body of `POST /login/eoa`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExistenceQuery<'a> {
    pub eoa: &'a str,
}

/// Data of `POST /login/eoa`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExistenceFlag {
    #[serde(default)]
    pub exists: Option<bool>,
}

/// Whether an account is known to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Missing,
    /// The service did not say
    Unknown,
}

impl Existence {
    /// Interpret an optional existence flag
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Existence::Exists,
            Some(false) => Existence::Missing,
            None => Existence::Unknown,
        }
    }
}

/// Listing entry of a form owned by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: FormId,
    /// Content identifier of the stored envelope
    pub cid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<bool>,
}

/// Element of `GET /all/form`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormListing {
    pub form: FormSummary,
}

/// Listing entry of a response submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub form_id: FormId,
    pub cid: String,
    #[serde(default)]
    pub title: String,
}

/// Element of `GET /all/response`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseListing {
    pub form_response: ResponseSummary,
}

/// Body of `POST /response`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseBody<'a> {
    pub form_response: &'a Envelope<FormResponse>,
}

/// Confirmation of a stored response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_err_short_circuits() {
        let response: ApiResponse<u32> =
            serde_json::from_str(r#"{"data": 7, "err": "form is closed"}"#).unwrap();
        assert!(matches!(
            response.into_data(),
            Err(ClientError::Rejected(msg)) if msg == "form is closed"
        ));
    }

    #[test]
    fn test_empty_err_is_success() {
        let response: ApiResponse<u32> = serde_json::from_str(r#"{"data": 7, "err": ""}"#).unwrap();
        assert_eq!(response.into_data().unwrap(), Some(7));
    }

    #[test]
    fn test_require_data() {
        let response: ApiResponse<u32> = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response.require_data("list"),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn test_existence_never_defaults_to_true() {
        let flag: ApiResponse<ExistenceFlag> = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        let exists = flag.into_data().unwrap().unwrap_or_default().exists;
        assert_eq!(Existence::from_flag(exists), Existence::Unknown);

        assert_eq!(Existence::from_flag(Some(false)), Existence::Missing);
        assert_eq!(Existence::from_flag(Some(true)), Existence::Exists);
    }

    #[test]
    fn test_listing_shapes() {
        let forms: Vec<FormListing> = serde_json::from_value(serde_json::json!([
            {"form": {
                "id": "f1",
                "cid": "bafy",
                "title": "Survey",
                "access": "public",
                "isClosed": false
            }}
        ]))
        .unwrap();
        assert_eq!(forms[0].form.id, FormId::new("f1"));
        assert_eq!(forms[0].form.access, Some(Access::Public));

        let responses: Vec<ResponseListing> = serde_json::from_value(serde_json::json!([
            {"formResponse": {"formId": "f1", "cid": "bafy2", "title": "Survey"}}
        ]))
        .unwrap();
        assert_eq!(responses[0].form_response.cid, "bafy2");
    }

    #[test]
    fn test_login_args_skip_absent_fields() {
        let args = LoginArgs {
            eoa: Some("0xabc".into()),
            ..LoginArgs::default()
        };
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            serde_json::json!({"eoa": "0xabc"})
        );
    }
}
