//! # Veilform CLI
//!
//! The `veilform` command: identity generation, sealing and opening
//! envelopes, local draft inspection and answering forms on a form service.
//!
//! Exit status is `0` on success, `2` when the credential was wrong and the
//! user should be asked again, and `1` for every other failure.

pub mod cli;
pub mod commands;
pub mod config;
pub mod identity_file;

pub use cli::{Cli, Command, EnvelopeKind};
pub use config::CliConfig;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;
use veilform_client::{FormService, HttpFormService};
use veilform_core::{EnvelopeError, FormId, Recovery, RecipientId};
use veilform_crypto::Credential;
use veilform_logging::VeilformSubscriberBuilder;
use veilform_session::{Reader, SessionError};
use veilform_storage::FileDraftStore;

use crate::cli::{DraftCommand, OpenArgs};
use crate::commands::RespondRequest;

/// Exit status for a failed command
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    let recovery = error.chain().find_map(|cause| {
        cause
            .downcast_ref::<EnvelopeError>()
            .map(EnvelopeError::recovery)
            .or_else(|| cause.downcast_ref::<SessionError>().map(SessionError::recovery))
    });
    match recovery {
        Some(Recovery::Reprompt) => 2,
        _ => 1,
    }
}

/// Parse-independent entry point: load configuration, set up logging, run
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;

    let mut logging = VeilformSubscriberBuilder::new().with_config(config.logging.clone());
    if let Some(level) = &cli.log_level {
        logging = logging.with_level(level.clone());
    }
    let _log_guard = logging.init().context("cannot initialize logging")?;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    execute(cli.command, &config, &mut stdout).await
}

/// Run one command against the given configuration
pub async fn execute(
    command: Command,
    config: &CliConfig,
    stdout: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Keygen { out, force } => commands::keygen(&out, force, stdout),

        Command::Seal(args) => {
            let password = match args.password_recipient {
                Some(_) => Some(commands::read_password()?),
                None => None,
            };
            let json = commands::seal(&args, password.as_deref(), config.session.password_kdf)?;
            std::fs::write(&args.out, json)
                .with_context(|| format!("cannot write {}", args.out.display()))?;
            writeln!(stdout, "{}", args.out.display())?;
            Ok(())
        }

        Command::Open(args) => {
            let (reader, credential) = open_credential(&args)?;
            let plaintext = commands::open(&args.envelope, args.kind, &reader, &credential)?;
            writeln!(stdout, "{}", plaintext)?;
            Ok(())
        }

        Command::Inspect { envelope, kind } => commands::inspect(&envelope, kind, stdout),

        Command::AccessCode {
            envelope,
            identity,
            kind,
        } => {
            let keys = identity_file::read(&identity)?;
            let code = commands::access_code(&envelope, kind, &keys)?;
            writeln!(stdout, "{}", code)?;
            Ok(())
        }

        Command::Draft { action } => match action {
            DraftCommand::Show(args) => {
                let dir = args.dir.unwrap_or_else(|| config.session.drafts_dir.clone());
                commands::draft_show(&dir, &FormId::new(args.form), stdout).await
            }
            DraftCommand::Clear(args) => {
                let dir = args.dir.unwrap_or_else(|| config.session.drafts_dir.clone());
                commands::draft_clear(&dir, &FormId::new(args.form), stdout).await
            }
        },

        Command::List { target } => {
            let service = HttpFormService::new(config.server.client_config())?;
            commands::list(&service, target, stdout).await
        }

        Command::Respond(args) => {
            let keys = identity_file::read(&args.identity)?;
            let mut reader = Reader::new(keys, args.account);
            if let Some(code) = &args.access_code {
                reader = reader.with_access_code(code)?;
            }
            let request = RespondRequest {
                form_id: FormId::new(args.form),
                reader,
                answers: commands::read_answers(&args.answers)?,
            };

            let dir = args.drafts.unwrap_or_else(|| config.session.drafts_dir.clone());
            let drafts = Arc::new(FileDraftStore::new(&dir).await?);
            let service: Arc<dyn FormService> =
                Arc::new(HttpFormService::new(config.server.client_config())?);
            debug!(drafts = %dir.display(), "Responding");

            commands::respond(
                request,
                service,
                drafts,
                config.session.session_config(),
                stdout,
            )
            .await
        }
    }
}

fn open_credential(args: &OpenArgs) -> anyhow::Result<(RecipientId, Credential)> {
    if let Some(path) = &args.identity {
        let keys = identity_file::read(path)?;
        return Ok((keys.recipient_id(), Credential::private_key(&keys)));
    }
    if let Some(code) = &args.access_code {
        return Ok((RecipientId::new("access-code"), Credential::access_code(code)?));
    }
    let reader = args.reader.as_deref().unwrap_or(RecipientId::PASSWORD);
    Ok((
        RecipientId::new(reader),
        Credential::password(commands::read_password()?),
    ))
}

#[cfg(test)]
mod tests {
    use veilform_client::ClientError;

    use super::*;

    #[test]
    fn test_exit_code_for_wrong_credential() {
        let err = anyhow::Error::from(EnvelopeError::CredentialMismatch);
        assert_eq!(exit_code_for(&err), 2);

        let err = err.context("opening survey.json");
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn test_exit_code_for_hard_stops() {
        assert_eq!(exit_code_for(&anyhow::Error::from(EnvelopeError::AccessDenied)), 1);
        assert_eq!(
            exit_code_for(&anyhow::Error::from(EnvelopeError::IntegrityMismatch)),
            1
        );
        assert_eq!(exit_code_for(&anyhow::anyhow!("cannot read file")), 1);
    }

    #[test]
    fn test_exit_code_for_session_errors() {
        let err = anyhow::Error::from(SessionError::Client(ClientError::Envelope(
            EnvelopeError::CredentialMismatch,
        )));
        assert_eq!(exit_code_for(&err), 2);
    }
}
