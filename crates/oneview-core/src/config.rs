//! Configuration structures for OneView clients.
//!
//! This module describes how to reach and authenticate against one appliance. Values
//! are validated with `validator`; loading them from files is left to the application.

use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// API version sent when none is configured.
pub const DEFAULT_API_VERSION: u32 = 300;

/// Login credentials for an appliance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    /// Appliance user name
    #[validate(length(min = 1))]
    #[serde(rename = "userName")]
    pub user_name: String,

    /// Password; never serialized
    #[serde(skip_serializing)]
    pub password: SecretString,

    /// Directory the user belongs to, when not local
    #[serde(
        rename = "authLoginDomain",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_login_domain: Option<String>,
}

impl Credentials {
    /// Credentials for a local appliance user.
    #[must_use]
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: SecretString::from(password.into()),
            auth_login_domain: None,
        }
    }

    /// Set the login domain.
    #[must_use]
    pub fn with_login_domain(mut self, domain: impl Into<String>) -> Self {
        self.auth_login_domain = Some(domain.into());
        self
    }
}

/// Configuration for a connection to one appliance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OneViewConfig {
    /// Appliance base URL, e.g. `https://oneview.example.com`
    #[validate(url)]
    pub url: String,

    /// Login credentials; without them requests are sent unauthenticated
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// REST API version sent in `X-API-Version`
    #[validate(range(min = 120, max = 8000))]
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to custom CA certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of retry attempts
    #[validate(range(min = 0, max = 10))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first transport retry, in milliseconds; doubles per attempt
    #[validate(range(max = 60000))]
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Base delay between task polls, in seconds
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_task_poll_interval_secs")]
    pub task_poll_interval_secs: u64,
}

const fn default_api_version() -> u32 {
    DEFAULT_API_VERSION
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    500
}

const fn default_task_poll_interval_secs() -> u64 {
    1
}

impl OneViewConfig {
    /// Create a configuration for the appliance at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            url: url.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set login credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the REST API version.
    #[must_use]
    pub const fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: std::path::PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set maximum retry attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial transport retry delay in milliseconds.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, millis: u64) -> Self {
        self.retry_delay_ms = millis;
        self
    }

    /// Set the base task poll interval in seconds.
    #[must_use]
    pub const fn with_task_poll_interval(mut self, seconds: u64) -> Self {
        self.task_poll_interval_secs = seconds;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the initial retry delay as a Duration.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Get the task poll interval as a Duration.
    #[must_use]
    pub const fn task_poll_interval(&self) -> Duration {
        Duration::from_secs(self.task_poll_interval_secs)
    }

    /// Parse and validate the appliance URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_url(&self) -> Result<Url, Error> {
        Url::parse(&self.url).map_err(|e| Error::ConfigError(format!("Invalid OneView URL: {e}")))
    }
}

impl Default for OneViewConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost".to_string(),
            credentials: None,
            api_version: default_api_version(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            task_poll_interval_secs: default_task_poll_interval_secs(),
        }
    }
}
