//! Configuration for the HTTP form service client

use std::time::Duration;

/// Configuration for an HttpFormService
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `https://api.example.com`
    pub base_url: String,
    /// Timeout for a whole request
    pub request_timeout: Duration,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Token to present before the first login
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given service URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the initial auth token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}
