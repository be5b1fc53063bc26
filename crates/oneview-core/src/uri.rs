//! Resource URI validation and derivation.
//!
//! Every resource collection lives under a base path such as `/rest/interconnects`.
//! Callers may address members either by bare identifier or by full URI; the resolver
//! normalizes both forms and rejects URIs that belong to another collection.

use crate::error::{Error, Result};
use crate::types::REST_PREFIX;

/// Resolves identifiers and URIs against one resource base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriResolver {
    base_uri: String,
}

impl UriResolver {
    /// Create a resolver for the given base path (e.g. `/rest/interconnects`).
    #[must_use]
    pub fn new(base_uri: impl Into<String>) -> Self {
        let mut base_uri = base_uri.into();
        while base_uri.len() > 1 && base_uri.ends_with('/') {
            base_uri.pop();
        }
        Self { base_uri }
    }

    /// The resource base path.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Resolves an identifier or URI to the member URI.
    ///
    /// Bare identifiers are appended to the base path; URIs under the base path are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty input and
    /// [`Error::UnrecognizedUri`] for a URI outside the base path or one with nothing
    /// after the base path.
    pub fn build_uri(&self, id_or_uri: &str) -> Result<String> {
        if id_or_uri.is_empty() {
            return Err(Error::invalid_argument("id_or_uri"));
        }

        if !id_or_uri.starts_with(REST_PREFIX) {
            return Ok(format!("{}/{id_or_uri}", self.base_uri));
        }

        self.validate_resource_uri(id_or_uri)?;
        let remainder = &id_or_uri[self.base_uri.len()..];
        if remainder.trim_start_matches('/').is_empty() {
            return Err(Error::UnrecognizedUri(id_or_uri.to_string()));
        }
        Ok(id_or_uri.to_string())
    }

    /// Builds the URI of a nested resource.
    ///
    /// Produces `parent/subresource_path[/subresource]`. A subresource value that is
    /// already a path (contains `/`) is returned as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the parent is missing, or any error from
    /// [`Self::build_uri`] for the parent.
    pub fn build_subresource_uri(
        &self,
        resource_id_or_uri: Option<&str>,
        subresource_id_or_uri: Option<&str>,
        subresource_path: &str,
    ) -> Result<String> {
        if let Some(subresource) = subresource_id_or_uri.filter(|s| s.contains('/')) {
            return Ok(subresource.to_string());
        }

        let parent = resource_id_or_uri
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::invalid_argument("resource_id_or_uri"))?;
        let parent = self.build_uri(parent)?;

        let mut uri = parent;
        for segment in [subresource_path, subresource_id_or_uri.unwrap_or_default()] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                uri.push('/');
                uri.push_str(segment);
            }
        }
        Ok(uri)
    }

    /// Checks that a URI is the base path itself or lies below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedUri`] otherwise.
    pub fn validate_resource_uri(&self, uri: &str) -> Result<()> {
        let belongs = uri
            .strip_prefix(self.base_uri.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));

        if belongs {
            Ok(())
        } else {
            Err(Error::UnrecognizedUri(uri.to_string()))
        }
    }

    /// Resolves the target of a trigger-style call.
    ///
    /// Full appliance URIs are used verbatim so that callers can address action
    /// endpoints of related collections; bare identifiers go through
    /// [`Self::build_uri`].
    pub(crate) fn resolve_target(&self, uri_or_id: &str) -> Result<String> {
        if uri_or_id.is_empty() {
            return Err(Error::invalid_argument("uri_or_id"));
        }
        if uri_or_id.starts_with(REST_PREFIX) {
            Ok(uri_or_id.to_string())
        } else {
            self.build_uri(uri_or_id)
        }
    }
}
