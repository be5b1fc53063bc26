//! HTTP transport for the OneView REST API.
//!
//! This module provides the retry policy and [`HttpConnection`], the reqwest-backed
//! [`Connection`] that handles login sessions, standard appliance headers and deferred
//! (`202 Accepted`) responses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION,
};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Credentials, OneViewConfig};
use crate::connection::Connection;
use crate::error::{map_status_to_error, Error, Result};
use crate::types::{into_entity, CustomHeaders, Response, TaskHandle};

const USER_AGENT: &str = concat!("oneview-core/", env!("CARGO_PKG_VERSION"));

/// Endpoint that creates and removes login sessions
pub const LOGIN_SESSIONS_PATH: &str = "/rest/login-sessions";

/// Header carrying the session token
pub const AUTH_HEADER: &str = "Auth";

/// Header carrying the REST API version
pub const API_VERSION_HEADER: &str = "X-API-Version";

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";
const LANGUAGE: &str = "en_US";

/// Idle timeout for pooled connections, in seconds
const POOL_IDLE_TIMEOUT: u64 = 90;

/// Maximum idle connections kept per appliance
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Connect timeout, in seconds
const CONNECT_TIMEOUT: u64 = 10;

/// Upper bound for the doubling retry delay, in milliseconds
const RETRY_MAX_DELAY_MS: u64 = 5000;

/// Retry schedule for transient transport failures.
///
/// The delay doubles after every attempt, up to a fixed cap. The resource layer above
/// the transport never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap for the doubling delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Retry schedule configured for one appliance.
    #[must_use]
    pub fn from_config(config: &OneViewConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.retry_delay(),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS).max(config.retry_delay()),
        }
    }

    /// Delay before retry number `attempt` (1-based); zero for attempt 0.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2_u32.saturating_pow(attempt - 1);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// reqwest client for `config`.
fn build_http_client(config: &OneViewConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
        .gzip(true)
        .cookie_store(true);

    if !config.tls_verify {
        warn!("TLS verification disabled for OneView connection");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ca_cert) = &config.tls_ca_cert {
        debug!("loading OneView CA certificate from {}", ca_cert.display());
        let bytes = std::fs::read(ca_cert).map_err(|err| {
            Error::ConfigError(format!(
                "Failed to read OneView CA certificate {}: {err}",
                ca_cert.display()
            ))
        })?;
        let cert = reqwest::Certificate::from_pem(&bytes)
            .map_err(|err| Error::ConfigError(format!("Invalid OneView CA certificate: {err}")))?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|err| Error::ConfigError(format!("Failed to build OneView HTTP client: {err}")))
}

/// Status, `Location` header and decoded body of one exchange.
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

/// reqwest-backed [`Connection`] to one appliance.
///
/// Clones share the login session.
#[derive(Clone)]
pub struct HttpConnection {
    http: Client,
    base_url: Url,
    api_version: u32,
    credentials: Option<Credentials>,
    session: Arc<RwLock<Option<String>>>,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl HttpConnection {
    /// Construct a connection from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for an invalid URL, an unreadable CA certificate,
    /// or a client that cannot be built.
    pub fn from_config(config: &OneViewConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.parse_url()?,
            api_version: config.api_version,
            credentials: config.credentials.clone(),
            session: Arc::new(RwLock::new(None)),
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    /// The appliance base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The REST API version sent with every request.
    #[must_use]
    pub const fn api_version(&self) -> u32 {
        self.api_version
    }

    /// The current session token, if logged in.
    pub async fn session_id(&self) -> Option<String> {
        self.session.read().await.clone()
    }

    /// Use an existing session token instead of logging in.
    pub async fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session.write().await = Some(session_id.into());
    }

    /// Open a login session with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] without credentials, [`Error::Unauthorized`] for
    /// rejected credentials, and [`Error::InvalidResponse`] when the appliance answers
    /// without a `sessionID`.
    pub async fn login(&self) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::ConfigError("no credentials configured".to_string()))?;

        let mut body = json!({
            "userName": credentials.user_name,
            "password": credentials.password.expose_secret(),
        });
        if let Some(domain) = &credentials.auth_login_domain {
            body["authLoginDomain"] = Value::String(domain.clone());
        }

        let raw = self
            .execute(Method::POST, LOGIN_SESSIONS_PATH, Some(&body), None, JSON)
            .await?;
        let session_id = raw
            .body
            .get("sessionID")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("login response has no sessionID".to_string()))?
            .to_string();

        info!(user = %credentials.user_name, "Logged in to OneView");
        *self.session.write().await = Some(session_id);
        Ok(())
    }

    /// Close the current login session, if any.
    ///
    /// # Errors
    ///
    /// Propagates transport errors; the local session is cleared regardless.
    pub async fn logout(&self) -> Result<()> {
        if self.session.read().await.is_none() {
            return Ok(());
        }

        let result = self
            .execute(Method::DELETE, LOGIN_SESSIONS_PATH, None, None, JSON)
            .await;
        *self.session.write().await = None;
        result.map(|_| ())
    }

    fn build_url(&self, uri: &str) -> Result<Url> {
        self.base_url
            .join(uri)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid OneView path `{uri}`: {err}")))
    }

    async fn build_headers(
        &self,
        custom: Option<&CustomHeaders>,
        content_type: &'static str,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-api-version"),
            HeaderValue::from(self.api_version),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(LANGUAGE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

        if let Some(session) = self.session.read().await.as_deref() {
            let value = HeaderValue::from_str(session)
                .map_err(|err| Error::InvalidArgument(format!("invalid session token: {err}")))?;
            headers.insert(HeaderName::from_static("auth"), value);
        }

        for (name, value) in custom.into_iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| Error::InvalidArgument(format!("invalid header `{name}`: {err}")))?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                Error::InvalidArgument(format!("invalid value for header `{name}`: {err}"))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    async fn execute(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        custom: Option<&CustomHeaders>,
        content_type: &'static str,
    ) -> Result<RawResponse> {
        let url = self.build_url(uri)?;
        let headers = self.build_headers(custom, content_type).await?;
        let payload = body.map(serde_json::to_vec).transpose()?;

        let mut attempt = 0;
        #[allow(unused_assignments)]
        let mut last_error: Option<Error> = None;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(payload) = &payload {
                request = request.body(payload.clone());
            }

            info!(method = %method, uri = %uri, attempt, "Sending OneView request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let location = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    let text = response.text().await?;

                    if status.is_success() {
                        return Ok(RawResponse {
                            status,
                            location,
                            body: parse_body(&text)?,
                        });
                    }

                    let error = map_status_to_error(status, &text);
                    if !matches!(error, Error::ServiceUnavailable(_)) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(err) => {
                    let error = Error::from(err);
                    if !error.is_transient() {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                break;
            }

            let delay = self.retry_policy.delay_for_attempt(attempt);
            if delay > Duration::ZERO {
                debug!("Retrying OneView request after {:?}", delay);
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::ServiceUnavailable("OneView request failed after retries".to_string())
        }))
    }

    async fn into_response(&self, raw: RawResponse) -> Result<Response> {
        if raw.status != StatusCode::ACCEPTED {
            return Ok(Response::Immediate(raw.body));
        }

        if let Some(task) = TaskHandle::from_body(&raw.body) {
            return Ok(Response::Deferred(task));
        }

        match raw.location {
            Some(location) => {
                debug!(location = %location, "Fetching task of accepted request");
                let task = self.get(&location).await?;
                Ok(Response::Deferred(TaskHandle::new(into_entity(task)?)))
            }
            None => Ok(Response::Immediate(raw.body)),
        }
    }

    async fn send_with_body(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
        content_type: &'static str,
    ) -> Result<Response> {
        let raw = self
            .execute(method, uri, body.as_ref(), headers.as_ref(), content_type)
            .await?;
        self.into_response(raw).await
    }
}

fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|err| Error::InvalidResponse(format!("Failed to parse OneView response: {err}")))
}

#[async_trait]
impl Connection for HttpConnection {
    async fn get(&self, uri: &str) -> Result<Value> {
        self.execute(Method::GET, uri, None, None, JSON)
            .await
            .map(|raw| raw.body)
    }

    async fn post(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response> {
        self.send_with_body(Method::POST, uri, body, headers, JSON).await
    }

    async fn put(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response> {
        self.send_with_body(Method::PUT, uri, body, headers, JSON).await
    }

    async fn patch(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response> {
        self.send_with_body(Method::PATCH, uri, body, headers, JSON_PATCH)
            .await
    }

    async fn delete(&self, uri: &str, headers: Option<CustomHeaders>) -> Result<Response> {
        self.send_with_body(Method::DELETE, uri, None, headers, JSON)
            .await
    }
}
