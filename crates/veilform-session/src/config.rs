//! Configuration for response sessions

use std::time::Duration;

use veilform_core::PasswordKdf;

use crate::autosave::MIN_AUTOSAVE_INTERVAL;

/// Configuration for a ResponseSession
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the autosave timer
    pub autosave_interval: Duration,
    /// Upper bound for opening the form and any finalized response
    pub open_timeout: Duration,
    /// Upper bound for the network submission
    pub submit_timeout: Duration,
    /// Argon2id parameters used when sealing for password recipients
    pub password_kdf: PasswordKdf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(30),
            open_timeout: Duration::from_secs(15),
            submit_timeout: Duration::from_secs(30),
            password_kdf: PasswordKdf::default(),
        }
    }
}

impl SessionConfig {
    /// Set the autosave period, no shorter than [`MIN_AUTOSAVE_INTERVAL`]
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval.max(MIN_AUTOSAVE_INTERVAL);
        self
    }

    /// Set the open timeout
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Set the submit timeout
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the password KDF parameters
    pub fn with_password_kdf(mut self, kdf: PasswordKdf) -> Self {
        self.password_kdf = kdf;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.autosave_interval, Duration::from_secs(30));
        assert_eq!(config.open_timeout, Duration::from_secs(15));
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::default()
            .with_autosave_interval(Duration::from_secs(5))
            .with_submit_timeout(Duration::from_millis(500))
            .with_password_kdf(PasswordKdf::argon2id(64, 1, 1));
        assert_eq!(config.autosave_interval, Duration::from_secs(5));
        assert_eq!(config.submit_timeout, Duration::from_millis(500));
        assert_eq!(config.password_kdf.memory_kib, 64);
    }

    #[test]
    fn test_autosave_interval_has_floor() {
        let config = SessionConfig::default().with_autosave_interval(Duration::ZERO);
        assert_eq!(config.autosave_interval, MIN_AUTOSAVE_INTERVAL);
    }
}
