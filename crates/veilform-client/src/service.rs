//! The form storage service seam

use async_trait::async_trait;
use veilform_core::{Envelope, FormDocument, FormId, FormResponse};

use crate::api::{
    Existence, FormSummary, LoginArgs, LoginResponse, ResponseSummary, SubmissionReceipt,
};
use crate::error::ClientResult;

/// Operations of the form storage service
///
/// The service is opaque: it stores and returns envelopes and never sees
/// plaintext or unwrapped keys.
#[async_trait]
pub trait FormService: Send + Sync {
    /// Log in; a returned token is retained for later requests
    async fn login(&self, args: LoginArgs) -> ClientResult<LoginResponse>;

    /// Whether an account identifier is known to the service
    async fn identity_exists(&self, eoa: &str) -> ClientResult<Existence>;

    /// Forms owned by the caller
    async fn list_forms(&self) -> ClientResult<Vec<FormSummary>>;

    /// Responses submitted by the caller
    async fn list_responses(&self) -> ClientResult<Vec<ResponseSummary>>;

    /// Fetch a published form
    async fn fetch_form(&self, form_id: &FormId) -> ClientResult<Envelope<FormDocument>>;

    /// Fetch the caller's finalized response to a form, if any
    async fn fetch_response(
        &self,
        form_id: &FormId,
    ) -> ClientResult<Option<Envelope<FormResponse>>>;

    /// Submit a sealed response
    async fn submit_response(
        &self,
        response: &Envelope<FormResponse>,
    ) -> ClientResult<SubmissionReceipt>;
}
