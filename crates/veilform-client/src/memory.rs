//! In-memory form service
//!
//! Behaves like the storage service for a single caller: it keeps forms and
//! responses by form identifier and never looks inside an envelope beyond
//! its cleartext metadata. Call counters and failure injection make it the
//! test double for sessions.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::{debug, trace};
use veilform_core::{Envelope, FormDocument, FormId, FormResponse};

use crate::api::{
    Existence, FormSummary, LoginArgs, LoginResponse, ResponseSummary, SubmissionReceipt,
};
use crate::error::{ClientError, ClientResult};
use crate::service::FormService;

/// Failure the in-memory service can be told to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Answer with a service `err`
    Rejected(String),
    /// Fail as if the connection dropped
    Transport(String),
}

impl InjectedFailure {
    fn into_error(self) -> ClientError {
        match self {
            InjectedFailure::Rejected(msg) => ClientError::Rejected(msg),
            InjectedFailure::Transport(msg) => ClientError::Transport(msg),
        }
    }
}

/// In-memory implementation of FormService
#[derive(Debug, Default)]
pub struct InMemoryFormService {
    forms: DashMap<FormId, Envelope<FormDocument>>,
    responses: DashMap<FormId, Envelope<FormResponse>>,
    accounts: DashSet<String>,
    submit_calls: AtomicUsize,
    fetch_form_calls: AtomicUsize,
    login_calls: AtomicUsize,
    submit_failures: Mutex<Vec<InjectedFailure>>,
    submit_delay: Mutex<Option<Duration>>,
}

impl InMemoryFormService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a published form
    pub fn publish_form(&self, envelope: Envelope<FormDocument>) {
        let form_id = envelope.payload.meta.form_id.clone();
        debug!(form_id = %form_id, "Published form");
        self.forms.insert(form_id, envelope);
    }

    /// Mark a stored form closed or open
    pub fn set_form_closed(&self, form_id: &FormId, closed: bool) -> bool {
        match self.forms.get_mut(form_id) {
            Some(mut form) => {
                form.payload.meta.is_closed = closed;
                true
            }
            None => false,
        }
    }

    /// Register an account identifier
    pub fn register_account(&self, eoa: impl Into<String>) {
        self.accounts.insert(eoa.into());
    }

    /// Stored response for a form
    pub fn stored_response(&self, form_id: &FormId) -> Option<Envelope<FormResponse>> {
        self.responses.get(form_id).map(|r| r.value().clone())
    }

    /// Make the next submissions fail, in order
    pub fn fail_next_submits(&self, failures: impl IntoIterator<Item = InjectedFailure>) {
        if let Ok(mut queue) = self.submit_failures.lock() {
            queue.extend(failures);
        }
    }

    /// Delay every submission by the given duration
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        if let Ok(mut current) = self.submit_delay.lock() {
            *current = delay;
        }
    }

    /// Number of submit calls received
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of form fetches received
    pub fn fetch_form_calls(&self) -> usize {
        self.fetch_form_calls.load(Ordering::SeqCst)
    }

    /// Number of login calls received
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn next_submit_failure(&self) -> Option<InjectedFailure> {
        let mut queue = self.submit_failures.lock().ok()?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    fn current_submit_delay(&self) -> Option<Duration> {
        self.submit_delay.lock().ok().and_then(|delay| *delay)
    }
}

#[async_trait]
impl FormService for InMemoryFormService {
    async fn login(&self, args: LoginArgs) -> ClientResult<LoginResponse> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(eoa) = &args.eoa {
            self.accounts.insert(eoa.clone());
        }
        Ok(LoginResponse {
            token: Some(format!("memory-token-{}", n)),
            eoa: args.eoa,
        })
    }

    async fn identity_exists(&self, eoa: &str) -> ClientResult<Existence> {
        Ok(Existence::from_flag(Some(self.accounts.contains(eoa))))
    }

    async fn list_forms(&self) -> ClientResult<Vec<FormSummary>> {
        let mut forms: Vec<FormSummary> = self
            .forms
            .iter()
            .map(|entry| {
                let meta = &entry.payload.meta;
                FormSummary {
                    id: meta.form_id.clone(),
                    cid: entry.proof.content_hash.to_hex(),
                    title: meta.title.clone().unwrap_or_default(),
                    access: Some(entry.access()),
                    is_closed: Some(meta.is_closed),
                }
            })
            .collect();
        forms.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(forms)
    }

    async fn list_responses(&self) -> ClientResult<Vec<ResponseSummary>> {
        let mut responses: Vec<ResponseSummary> = self
            .responses
            .iter()
            .map(|entry| {
                let form_id = entry.payload.meta.form_id.clone();
                let title = self
                    .forms
                    .get(&form_id)
                    .and_then(|form| form.payload.meta.title.clone())
                    .unwrap_or_default();
                ResponseSummary {
                    form_id,
                    cid: entry.proof.content_hash.to_hex(),
                    title,
                }
            })
            .collect();
        responses.sort_by(|a, b| a.form_id.cmp(&b.form_id));
        Ok(responses)
    }

    async fn fetch_form(&self, form_id: &FormId) -> ClientResult<Envelope<FormDocument>> {
        self.fetch_form_calls.fetch_add(1, Ordering::SeqCst);
        self.forms
            .get(form_id)
            .map(|form| form.value().clone())
            .ok_or_else(|| ClientError::NotFound(format!("form {}", form_id)))
    }

    async fn fetch_response(
        &self,
        form_id: &FormId,
    ) -> ClientResult<Option<Envelope<FormResponse>>> {
        Ok(self.stored_response(form_id))
    }

    async fn submit_response(
        &self,
        response: &Envelope<FormResponse>,
    ) -> ClientResult<SubmissionReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.current_submit_delay() {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.next_submit_failure() {
            trace!(failure = ?failure, "Injected submit failure");
            return Err(failure.into_error());
        }

        response.validate()?;
        let form_id = response.payload.meta.form_id.clone();
        let closed = self
            .forms
            .get(&form_id)
            .map(|form| form.payload.meta.is_closed)
            .ok_or_else(|| ClientError::Rejected(format!("unknown form {}", form_id)))?;
        if closed {
            return Err(ClientError::rejected("form is not accepting responses"));
        }

        let cid = response.proof.content_hash.to_hex();
        self.responses.insert(form_id.clone(), response.clone());
        debug!(form_id = %form_id, "Stored response");

        Ok(SubmissionReceipt {
            form_id: Some(form_id),
            cid: Some(cid),
        })
    }
}
