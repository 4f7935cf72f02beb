//! One response composition session
//!
//! A [`ResponseSession`] is built per form view and owns everything the
//! composition needs: the opened form, the answer set, the draft snapshotter,
//! the autosave timer and the submission guard. Nothing is shared between
//! sessions.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use veilform_client::{FormService, SubmissionReceipt};
use veilform_core::{
    Answers, Envelope, EnvelopeError, EnvelopeResult, FormDocument, FormId, FormResponse,
    RecipientId, ResponseMeta,
};
use veilform_crypto::{Credential, KeyPair, Opener, Recipient, SealRequest, Sealer, public_key_of};
use veilform_storage::DraftStore;

use crate::autosave::{AutosaveHandle, AutosaveTask, DraftSnapshotter};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::guard::{GuardState, SubmissionGuard};
use crate::opening::open_with_timeout;

/// What a session allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Answers can be edited and submitted
    Compose,
    /// A finalized response exists; answers are read-only
    Review,
    /// The form no longer accepts responses
    Closed,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Compose => write!(f, "compose"),
            SessionMode::Review => write!(f, "review"),
            SessionMode::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of a completion trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// This trigger submitted the response
    Accepted(SubmissionReceipt),
    /// Another trigger owns the submission; nothing was sent
    Ignored,
}

/// The person composing a response
#[derive(Debug, Clone)]
pub struct Reader {
    keys: KeyPair,
    account: String,
    form_reader: RecipientId,
    form_credential: Credential,
}

impl Reader {
    /// A reader opening the form with their own private key
    pub fn new(keys: KeyPair, account: impl Into<String>) -> Self {
        Self {
            form_reader: keys.recipient_id(),
            form_credential: Credential::private_key(&keys),
            keys,
            account: account.into(),
        }
    }

    /// Open the form through a password entry instead
    pub fn with_password(
        mut self,
        entry: impl Into<RecipientId>,
        password: impl Into<String>,
    ) -> Self {
        self.form_reader = entry.into();
        self.form_credential = Credential::password(password);
        self
    }

    /// Open the form with a shared access code instead
    pub fn with_access_code(mut self, code: &str) -> EnvelopeResult<Self> {
        self.form_credential = Credential::access_code(code)?;
        Ok(self)
    }

    /// Responder key pair
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Responder account identifier
    pub fn account(&self) -> &str {
        &self.account
    }
}

/// A composition session for one form and one reader
pub struct ResponseSession {
    form_id: FormId,
    form: Envelope<FormDocument>,
    document: FormDocument,
    mode: SessionMode,
    reader: Reader,
    config: SessionConfig,
    sealer: Sealer,
    service: Arc<dyn FormService>,
    answers: Arc<RwLock<Answers>>,
    snapshotter: Arc<DraftSnapshotter>,
    guard: SubmissionGuard,
    autosave: Mutex<Option<AutosaveHandle>>,
}

impl fmt::Debug for ResponseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSession")
            .field("form_id", &self.form_id)
            .field("mode", &self.mode)
            .field("guard", &self.guard.state())
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl ResponseSession {
    /// Open a form and prepare a session for it
    ///
    /// A finalized response puts the session in review mode with no timer.
    /// Otherwise a saved draft is restored before the autosave timer is
    /// armed.
    #[instrument(skip(reader, service, drafts, config), fields(form_id = %form_id))]
    pub async fn start(
        form_id: FormId,
        reader: Reader,
        service: Arc<dyn FormService>,
        drafts: Arc<dyn DraftStore>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let opener = Arc::new(Opener::new());

        let form = service.fetch_form(&form_id).await?;
        if form.payload.meta.form_id != form_id {
            return Err(EnvelopeError::validation(format!(
                "service returned form {} for {}",
                form.payload.meta.form_id, form_id
            ))
            .into());
        }
        let document = open_with_timeout(
            Arc::clone(&opener),
            form.clone(),
            reader.form_reader.clone(),
            reader.form_credential.clone(),
            config.open_timeout,
        )
        .await?;

        let mut answers = Answers::new();
        let mode = match service.fetch_response(&form_id).await? {
            Some(response) => {
                let response = open_with_timeout(
                    opener,
                    response,
                    reader.keys.recipient_id(),
                    Credential::private_key(&reader.keys),
                    config.open_timeout,
                )
                .await?;
                answers = response.answers;
                SessionMode::Review
            }
            None if !form.payload.meta.accepts_responses_at(Utc::now()) => SessionMode::Closed,
            None => {
                match drafts.load(&form_id).await {
                    Ok(Some(draft)) => {
                        info!(answers = draft.answers.len(), "Restored draft");
                        answers = draft.answers;
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Could not load draft"),
                }
                SessionMode::Compose
            }
        };

        let answers = Arc::new(RwLock::new(answers));
        let snapshotter = Arc::new(DraftSnapshotter::new(
            form_id.clone(),
            Arc::clone(&answers),
            drafts,
        ));

        // Armed only after the draft is in place
        let autosave = (mode == SessionMode::Compose)
            .then(|| AutosaveTask::spawn(Arc::clone(&snapshotter), config.autosave_interval));

        info!(mode = %mode, "Session opened");

        Ok(Self {
            form_id,
            form,
            document,
            mode,
            reader,
            sealer: Sealer::new().with_password_kdf(config.password_kdf),
            config,
            service,
            answers,
            snapshotter,
            guard: SubmissionGuard::new(),
            autosave: Mutex::new(autosave),
        })
    }

    /// Form identifier
    pub fn form_id(&self) -> &FormId {
        &self.form_id
    }

    /// The opened form definition
    pub fn document(&self) -> &FormDocument {
        &self.document
    }

    /// The form envelope as fetched
    pub fn form(&self) -> &Envelope<FormDocument> {
        &self.form
    }

    /// Current mode; a successful submission turns the session to review
    pub fn mode(&self) -> SessionMode {
        if self.guard.is_submitted() {
            SessionMode::Review
        } else {
            self.mode
        }
    }

    /// State of the submission guard
    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    /// Whether the autosave timer is running
    pub fn is_autosaving(&self) -> bool {
        self.autosave
            .lock()
            .map(|slot| slot.as_ref().is_some_and(AutosaveHandle::is_running))
            .unwrap_or(false)
    }

    /// Copy of the current answers
    pub async fn answers(&self) -> Answers {
        self.answers.read().await.clone()
    }

    /// Current answer for one question
    pub async fn answer(&self, key: &str) -> Option<Value> {
        self.answers.read().await.get(key).cloned()
    }

    /// Set an answer and snapshot the draft
    pub async fn set_answer(&self, key: impl Into<String>, value: Value) -> SessionResult<()> {
        self.ensure_composing()?;
        let changed = {
            let mut answers = self.answers.write().await;
            answers.insert(key.into(), value.clone()).as_ref() != Some(&value)
        };
        if changed {
            self.snapshotter.snapshot_or_warn().await;
        }
        Ok(())
    }

    /// Remove an answer and snapshot the draft
    pub async fn remove_answer(&self, key: &str) -> SessionResult<()> {
        self.ensure_composing()?;
        let removed = self.answers.write().await.remove(key).is_some();
        if removed {
            self.snapshotter.snapshot_or_warn().await;
        }
        Ok(())
    }

    /// Finalize and submit the response
    ///
    /// Only the first trigger submits; triggers arriving while it is in
    /// flight, or after it succeeded, return [`Submission::Ignored`]. A failed
    /// submission keeps the draft and the timer, and blocks further attempts
    /// until [`rearm_after_failure`](Self::rearm_after_failure).
    #[instrument(skip(self), fields(form_id = %self.form_id))]
    pub async fn complete(&self) -> SessionResult<Submission> {
        match self.mode {
            SessionMode::Compose => {}
            SessionMode::Review => return Err(SessionError::ReadOnly(SessionMode::Review)),
            SessionMode::Closed => return Err(SessionError::FormClosed(self.form_id.clone())),
        }

        if !self.form.payload.meta.accepts_responses_at(Utc::now()) {
            return Err(SessionError::FormClosed(self.form_id.clone()));
        }

        let Some(ticket) = self.guard.try_begin() else {
            return match self.guard.state() {
                GuardState::Failed => Err(SessionError::AwaitingRearm),
                state => {
                    debug!(guard = %state, "Ignoring duplicate completion trigger");
                    Ok(Submission::Ignored)
                }
            };
        };

        let answers = self.answers.read().await.clone();
        match self.submit(FormResponse::new(answers)).await {
            Ok(receipt) => {
                ticket.succeed();
                self.stop_autosave().await;
                if let Err(e) = self.snapshotter.discard().await {
                    warn!(error = %e, "Could not delete draft after submission");
                }
                info!(cid = receipt.cid.as_deref().unwrap_or(""), "Response submitted");
                Ok(Submission::Accepted(receipt))
            }
            Err(e) => {
                ticket.fail();
                error!(error = %e, "Response submission failed");
                Err(e)
            }
        }
    }

    /// Reopen the guard after a failed submission
    ///
    /// This is the explicit user action; nothing rearms automatically.
    pub fn rearm_after_failure(&self) -> bool {
        self.guard.rearm_after_failure()
    }

    /// Tear the session down, stopping the autosave timer
    pub async fn close(&self) {
        self.stop_autosave().await;
        debug!(form_id = %self.form_id, "Session closed");
    }

    fn ensure_composing(&self) -> SessionResult<()> {
        match self.mode() {
            SessionMode::Compose => Ok(()),
            mode => Err(SessionError::ReadOnly(mode)),
        }
    }

    async fn stop_autosave(&self) {
        let handle = self.autosave.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    async fn submit(&self, response: FormResponse) -> SessionResult<SubmissionReceipt> {
        let envelope = self.seal_response(&response)?;
        let timeout = self.config.submit_timeout;
        match tokio::time::timeout(timeout, self.service.submit_response(&envelope)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EnvelopeError::transient(format!(
                "submission timed out after {:?}",
                timeout
            ))
            .into()),
        }
    }

    /// Account identifier of the form owner
    ///
    /// Taken from the form parameters, else from the first account the form
    /// itself invites. Public keys are never used in its place.
    fn form_owner_account(&self) -> Option<String> {
        let form = &self.form.payload;
        form.meta
            .owner_account
            .clone()
            .or_else(|| form.invite_list.first().cloned())
    }

    /// Seal answers for the responder and the form's issuer and owner
    fn seal_response(&self, response: &FormResponse) -> EnvelopeResult<Envelope<FormResponse>> {
        let form = &self.form.payload;
        let access = self.form.access();
        let meta = ResponseMeta {
            form_id: self.form_id.clone(),
            access,
        };

        let mut request = SealRequest::new(response, meta, &self.reader.keys)
            .owner(public_key_of(&form.issuer_key)?)
            .access(access)
            .invite(self.reader.account.clone());
        if let Some(owner_account) = self.form_owner_account() {
            request = request.invite(owner_account);
        }
        if form.owner != form.issuer_key {
            request = request.recipient(Recipient::public_key(&public_key_of(&form.owner)?));
        }

        self.sealer.seal(request)
    }
}
