//! Command-line arguments

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "veilform", version, about = "Seal, open and answer end-to-end encrypted forms")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Plaintext kind of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EnvelopeKind {
    /// A published form
    #[default]
    Form,
    /// A submitted response
    Response,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate an X25519 identity and print its public key
    Keygen {
        /// Where to write the secret key
        #[arg(long)]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Seal a JSON document into an envelope
    Seal(SealArgs),
    /// Open an envelope and print its plaintext
    Open(OpenArgs),
    /// Print the cleartext parts of an envelope
    Inspect {
        #[arg(long)]
        envelope: PathBuf,
        #[arg(long, value_enum, default_value_t = EnvelopeKind::Form)]
        kind: EnvelopeKind,
    },
    /// Recover a shareable access code for an envelope
    AccessCode {
        #[arg(long)]
        envelope: PathBuf,
        /// Identity file of a recipient
        #[arg(long)]
        identity: PathBuf,
        #[arg(long, value_enum, default_value_t = EnvelopeKind::Form)]
        kind: EnvelopeKind,
    },
    /// Inspect or delete a local response draft
    Draft {
        #[command(subcommand)]
        action: DraftCommand,
    },
    /// List forms or responses held by the form service
    List {
        #[arg(value_enum)]
        target: ListTarget,
    },
    /// Answer a form on the form service and submit the response
    Respond(RespondArgs),
}

#[derive(Args, Debug)]
pub struct SealArgs {
    /// Plaintext JSON file
    #[arg(long)]
    pub input: PathBuf,
    /// Cleartext metadata JSON file
    #[arg(long)]
    pub meta: PathBuf,
    /// Identity file of the issuer
    #[arg(long)]
    pub identity: PathBuf,
    /// Owner public key (hex), defaults to the issuer
    #[arg(long)]
    pub owner: Option<String>,
    /// Additional recipient public key (hex), repeatable
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,
    /// Add a password entry under this identifier
    #[arg(long)]
    pub password_recipient: Option<String>,
    /// Expose the content key to any holder of the envelope
    #[arg(long)]
    pub public: bool,
    #[arg(long, value_enum, default_value_t = EnvelopeKind::Form)]
    pub kind: EnvelopeKind,
    /// Where to write the envelope
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("credential")
        .required(true)
        .args(["identity", "password", "access_code"])
))]
pub struct OpenArgs {
    #[arg(long)]
    pub envelope: PathBuf,
    /// Identity file of the reader
    #[arg(long)]
    pub identity: Option<PathBuf>,
    /// Read a password from VEILFORM_PASSWORD or stdin
    #[arg(long)]
    pub password: bool,
    /// Password entry to unwrap
    #[arg(long, requires = "password")]
    pub reader: Option<String>,
    /// Shared access code
    #[arg(long)]
    pub access_code: Option<String>,
    #[arg(long, value_enum, default_value_t = EnvelopeKind::Form)]
    pub kind: EnvelopeKind,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// Print the draft of a form
    Show(DraftArgs),
    /// Delete the draft of a form
    Clear(DraftArgs),
}

#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Draft directory, defaults to the configured one
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Form identifier
    #[arg(long)]
    pub form: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Forms,
    Responses,
}

#[derive(Args, Debug)]
pub struct RespondArgs {
    /// Form identifier
    #[arg(long)]
    pub form: String,
    /// Identity file of the responder
    #[arg(long)]
    pub identity: PathBuf,
    /// Responder account identifier
    #[arg(long)]
    pub account: String,
    /// JSON object of answers keyed by question
    #[arg(long)]
    pub answers: PathBuf,
    /// Open the form with a shared access code
    #[arg(long)]
    pub access_code: Option<String>,
    /// Draft directory, defaults to the configured one
    #[arg(long)]
    pub drafts: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_open_requires_a_credential() {
        let result = Cli::try_parse_from(["veilform", "open", "--envelope", "e.json"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "veilform",
            "open",
            "--envelope",
            "e.json",
            "--access-code",
            "abc",
            "--kind",
            "response",
        ])
        .unwrap();
        match cli.command {
            Command::Open(args) => {
                assert_eq!(args.access_code.as_deref(), Some("abc"));
                assert_eq!(args.kind, EnvelopeKind::Response);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_seal_collects_recipients() {
        let cli = Cli::try_parse_from([
            "veilform",
            "seal",
            "--input",
            "in.json",
            "--meta",
            "meta.json",
            "--identity",
            "id.key",
            "--recipient",
            "aa",
            "--recipient",
            "bb",
            "--public",
            "--out",
            "out.json",
        ])
        .unwrap();
        let Command::Seal(args) = cli.command else {
            panic!("expected seal");
        };
        assert_eq!(args.recipients, vec!["aa", "bb"]);
        assert!(args.public);
        assert_eq!(args.kind, EnvelopeKind::Form);
    }
}
