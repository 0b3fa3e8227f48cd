//! Client configuration
//!
//! All tunables are explicit values on a caller-owned object; nothing is
//! read from ambient global state.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for the cirrus client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service endpoint, e.g. `https://cirrus.example.com`
    pub endpoint: String,
    /// Username for basic auth, if the service requires it
    pub username: Option<String>,
    /// Password for basic auth
    pub password: Option<String>,
    /// Maximum attempts per read request (first try included)
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub retry_base_delay_ms: u64,
    /// Per-request deadline, in milliseconds
    pub request_timeout_ms: u64,
    /// Bounded worker count for batch dispatch
    pub max_workers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5101".to_string(),
            username: None,
            password: None,
            max_retries: 3,
            retry_base_delay_ms: 100,
            request_timeout_ms: 30_000,
            max_workers: 4,
        }
    }
}

impl ClientConfig {
    /// Create a config for `endpoint` with default tuning
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set basic auth credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the retry attempt limit
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff base delay
    pub fn with_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = ms;
        self
    }

    /// Set the per-request deadline
    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Set the batch worker count
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ClientResult<()> {
        if self.endpoint.is_empty() {
            return Err(ClientError::InvalidConfig(
                "endpoint must not be empty".to_string(),
            ));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        if self.max_retries == 0 {
            return Err(ClientError::InvalidConfig(
                "max_retries must be >= 1".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ClientError::InvalidConfig(
                "max_workers must be >= 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ClientError::InvalidConfig(
                "username and password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
