//! Command implementations
//!
//! Commands write their output to the given writer and return errors
//! through `anyhow`, keeping envelope and session errors downcastable for
//! the exit status.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use tracing::info;
use veilform_client::FormService;
use veilform_core::{
    Access, Answers, Envelope, FormDocument, FormId, FormResponse, PasswordKdf, RecipientId,
    Sealable,
};
use veilform_crypto::{
    Credential, KeyPair, Opener, Recipient, SealRequest, Sealer, public_key_of,
};
use veilform_session::{Reader, ResponseSession, SessionConfig, SessionMode, Submission};
use veilform_storage::{DraftStore, FileDraftStore};

use crate::cli::{EnvelopeKind, ListTarget, SealArgs};
use crate::identity_file;

/// Environment variable consulted before prompting for a password
pub const PASSWORD_ENV: &str = "VEILFORM_PASSWORD";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_envelope<T: Sealable>(path: &Path) -> Result<Envelope<T>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(Envelope::from_json(&contents)?)
}

/// Answers JSON object keyed by question
pub fn read_answers(path: &Path) -> Result<Answers> {
    read_json(path)
}

/// Password from the environment, or one line of stdin
pub fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password)
}

/// Generate an identity file and print its public key
pub fn keygen(out: &Path, force: bool, stdout: &mut dyn Write) -> Result<()> {
    let keys = KeyPair::generate();
    identity_file::write(out, &keys, force)?;
    info!(path = %out.display(), "Wrote identity");
    writeln!(stdout, "{}", keys.recipient_id())?;
    Ok(())
}

/// Seal a plaintext file and return the envelope JSON
pub fn seal(args: &SealArgs, password: Option<&str>, kdf: PasswordKdf) -> Result<String> {
    let issuer = identity_file::read(&args.identity)?;
    match args.kind {
        EnvelopeKind::Form => seal_as::<FormDocument>(args, &issuer, password, kdf),
        EnvelopeKind::Response => seal_as::<FormResponse>(args, &issuer, password, kdf),
    }
}

fn seal_as<T: Sealable>(
    args: &SealArgs,
    issuer: &KeyPair,
    password: Option<&str>,
    kdf: PasswordKdf,
) -> Result<String> {
    let plaintext: T = read_json(&args.input)?;
    let meta: T::Meta = read_json(&args.meta)?;
    let access = if args.public {
        Access::Public
    } else {
        Access::Protected
    };

    let mut request = SealRequest::new(&plaintext, meta, issuer).access(access);
    if let Some(owner) = &args.owner {
        request = request.owner(public_key_of(&RecipientId::new(owner.as_str()))?);
    }
    for recipient in &args.recipients {
        let key = public_key_of(&RecipientId::new(recipient.as_str()))
            .with_context(|| format!("invalid recipient key {}", recipient))?;
        request = request.recipient(Recipient::public_key(&key));
    }
    if let Some(entry) = &args.password_recipient {
        let password = password.context("a password is required for --password-recipient")?;
        request = request.recipient(Recipient::password(entry.as_str(), password));
    }

    let envelope = Sealer::new().with_password_kdf(kdf).seal(request)?;
    info!(
        kind = T::KIND,
        recipients = envelope.payload.recipient_keys.len(),
        "Sealed envelope"
    );
    Ok(envelope.to_json()?)
}

/// Open an envelope and return its plaintext as pretty JSON
pub fn open(
    path: &Path,
    kind: EnvelopeKind,
    reader: &RecipientId,
    credential: &Credential,
) -> Result<String> {
    match kind {
        EnvelopeKind::Form => open_as::<FormDocument>(path, reader, credential),
        EnvelopeKind::Response => open_as::<FormResponse>(path, reader, credential),
    }
}

fn open_as<T: Sealable>(
    path: &Path,
    reader: &RecipientId,
    credential: &Credential,
) -> Result<String> {
    let envelope = read_envelope::<T>(path)?;
    let plaintext = Opener::new().open(&envelope, reader, credential)?;
    Ok(serde_json::to_string_pretty(&plaintext)?)
}

/// Print the cleartext parts of an envelope
pub fn inspect(path: &Path, kind: EnvelopeKind, stdout: &mut dyn Write) -> Result<()> {
    match kind {
        EnvelopeKind::Form => inspect_as::<FormDocument>(path, stdout),
        EnvelopeKind::Response => inspect_as::<FormResponse>(path, stdout),
    }
}

fn inspect_as<T: Sealable>(path: &Path, stdout: &mut dyn Write) -> Result<()> {
    let envelope = read_envelope::<T>(path)?;
    envelope.validate()?;

    writeln!(stdout, "kind:         {}", T::KIND)?;
    writeln!(stdout, "access:       {}", envelope.access())?;
    writeln!(stdout, "header:       {}", serde_json::to_string(&envelope.header)?)?;
    writeln!(stdout, "issuer:       {}", envelope.payload.issuer_key)?;
    writeln!(stdout, "owner:        {}", envelope.payload.owner)?;
    writeln!(stdout, "meta:         {}", serde_json::to_string(&envelope.payload.meta)?)?;
    writeln!(stdout, "content hash: {}", envelope.proof.content_hash)?;
    writeln!(stdout, "key hash:     {}", envelope.proof.key_hash)?;
    writeln!(stdout, "recipients:")?;
    for recipient in envelope.recipients() {
        writeln!(stdout, "  {}", recipient)?;
    }
    if !envelope.payload.invite_list.is_empty() {
        writeln!(stdout, "invites:")?;
        for account in &envelope.payload.invite_list {
            writeln!(stdout, "  {}", account)?;
        }
    }
    Ok(())
}

/// Recover the access code of an envelope readable by `keys`
pub fn access_code(path: &Path, kind: EnvelopeKind, keys: &KeyPair) -> Result<String> {
    let reader = keys.recipient_id();
    let credential = Credential::private_key(keys);
    let key = match kind {
        EnvelopeKind::Form => Opener::new().recover_content_key(
            &read_envelope::<FormDocument>(path)?,
            &reader,
            &credential,
        )?,
        EnvelopeKind::Response => Opener::new().recover_content_key(
            &read_envelope::<FormResponse>(path)?,
            &reader,
            &credential,
        )?,
    };
    Ok(key.to_access_code())
}

/// Print the draft of a form
pub async fn draft_show(dir: &Path, form_id: &FormId, stdout: &mut dyn Write) -> Result<()> {
    let store = FileDraftStore::new(dir).await?;
    match store.load(form_id).await? {
        Some(draft) => {
            let answers = serde_json::to_string_pretty(&draft.answers)?;
            writeln!(stdout, "saved at {} ms", draft.saved_at_millis)?;
            writeln!(stdout, "{}", answers)?;
        }
        None => writeln!(stdout, "no draft for {}", form_id)?,
    }
    Ok(())
}

/// Delete the draft of a form
pub async fn draft_clear(dir: &Path, form_id: &FormId, stdout: &mut dyn Write) -> Result<()> {
    let store = FileDraftStore::new(dir).await?;
    let existed = store.contains(form_id).await?;
    store.delete(form_id).await?;
    if existed {
        writeln!(stdout, "deleted draft for {}", form_id)?;
    } else {
        writeln!(stdout, "no draft for {}", form_id)?;
    }
    Ok(())
}

/// List forms or responses held by the service
pub async fn list(
    service: &dyn FormService,
    target: ListTarget,
    stdout: &mut dyn Write,
) -> Result<()> {
    match target {
        ListTarget::Forms => {
            for form in service.list_forms().await? {
                let access = form.access.map(|a| a.to_string()).unwrap_or_default();
                let state = match form.is_closed {
                    Some(true) => "closed",
                    Some(false) => "open",
                    None => "",
                };
                writeln!(
                    stdout,
                    "{}\t{}\t{}\t{}\t{}",
                    form.id, form.title, access, state, form.cid
                )?;
            }
        }
        ListTarget::Responses => {
            for response in service.list_responses().await? {
                writeln!(
                    stdout,
                    "{}\t{}\t{}",
                    response.form_id, response.title, response.cid
                )?;
            }
        }
    }
    Ok(())
}

/// What `respond` needs besides the service and the draft store
#[derive(Debug)]
pub struct RespondRequest {
    pub form_id: FormId,
    pub reader: Reader,
    pub answers: Answers,
}

/// Answer a form through a response session and submit it
pub async fn respond(
    request: RespondRequest,
    service: Arc<dyn FormService>,
    drafts: Arc<dyn DraftStore>,
    config: SessionConfig,
    stdout: &mut dyn Write,
) -> Result<()> {
    let session =
        ResponseSession::start(request.form_id, request.reader, service, drafts, config).await?;
    if session.mode() == SessionMode::Review {
        session.close().await;
        bail!("a response to form {} was already submitted", session.form_id());
    }

    for (key, value) in request.answers {
        session.set_answer(key, value).await?;
    }
    let outcome = session.complete().await;
    session.close().await;

    match outcome? {
        Submission::Accepted(receipt) => {
            writeln!(
                stdout,
                "submitted response to {} ({})",
                session.form_id(),
                receipt.cid.as_deref().unwrap_or("no cid")
            )?;
        }
        Submission::Ignored => writeln!(stdout, "submission already in progress")?,
    }
    Ok(())
}
