//! Transport abstraction used by the resource layer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{CustomHeaders, Response};

/// Connection to one appliance.
///
/// Implementations own authentication, TLS, pooling and retries. The resource layer
/// issues exactly one call per logical step and never retries on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fetch `uri` and return the decoded body (`null` for an empty body).
    async fn get(&self, uri: &str) -> Result<Value>;

    /// POST `body` to `uri`.
    async fn post(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response>;

    /// PUT `body` to `uri`.
    async fn put(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response>;

    /// PATCH `uri` with a JSON-Patch document.
    async fn patch(
        &self,
        uri: &str,
        body: Option<Value>,
        headers: Option<CustomHeaders>,
    ) -> Result<Response>;

    /// DELETE `uri`.
    async fn delete(&self, uri: &str, headers: Option<CustomHeaders>) -> Result<Response>;
}
