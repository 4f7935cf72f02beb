//! TOML configuration for the command-line tool
//!
//! Every section and field is optional; missing values fall back to the
//! defaults of the library crates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use veilform_client::ClientConfig;
use veilform_core::PasswordKdf;
use veilform_logging::LogConfig;
use veilform_session::SessionConfig;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub logging: LogConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            session: SessionSettings::default(),
            logging: LogConfig {
                default_level: "warn".to_string(),
                ..LogConfig::default()
            },
        }
    }
}

impl CliConfig {
    /// Load the configuration file, or the defaults when none is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Form service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub auth_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            base_url: defaults.base_url,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            auth_token: None,
        }
    }
}

impl ServerSettings {
    /// Client configuration for these settings
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::with_base_url(self.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        match &self.auth_token {
            Some(token) => config.with_auth_token(token.clone()),
            None => config,
        }
    }
}

/// Response session and draft settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub drafts_dir: PathBuf,
    pub autosave_interval_secs: u64,
    pub open_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub password_kdf: PasswordKdf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            drafts_dir: PathBuf::from("./veilform-drafts"),
            autosave_interval_secs: defaults.autosave_interval.as_secs(),
            open_timeout_secs: defaults.open_timeout.as_secs(),
            submit_timeout_secs: defaults.submit_timeout.as_secs(),
            password_kdf: defaults.password_kdf,
        }
    }
}

impl SessionSettings {
    /// Session configuration for these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_autosave_interval(Duration::from_secs(self.autosave_interval_secs))
            .with_open_timeout(Duration::from_secs(self.open_timeout_secs))
            .with_submit_timeout(Duration::from_secs(self.submit_timeout_secs))
            .with_password_kdf(self.password_kdf)
    }
}
