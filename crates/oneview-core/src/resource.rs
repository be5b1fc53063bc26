//! Generic resource client.
//!
//! [`ResourceClient`] implements the collection protocol shared by every appliance
//! resource type: identifier resolution, paginated reads, filtered lookups, and
//! mutating calls whose completion may be deferred to a task. Per-resource wrappers
//! only supply a base URI and their own endpoint suffixes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::query::{append_query, QueryParams, QuerySpec, UtilizationQuery};
use crate::task::{TaskMonitor, TaskOutcome};
use crate::types::{entity_uri, Entity, Page, RequestOptions, Response, Timeout};
use crate::uri::UriResolver;

const FORCE_QUERY: &str = "force=True";

/// Target of a delete: a bare identifier or URI, or an entity carrying its `uri`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceRef<'a> {
    /// Identifier or URI
    Id(&'a str),
    /// Entity previously returned by the appliance
    Entity(&'a Entity),
}

impl<'a> From<&'a str> for ResourceRef<'a> {
    fn from(value: &'a str) -> Self {
        Self::Id(value)
    }
}

impl<'a> From<&'a String> for ResourceRef<'a> {
    fn from(value: &'a String) -> Self {
        Self::Id(value.as_str())
    }
}

impl<'a> From<&'a Entity> for ResourceRef<'a> {
    fn from(value: &'a Entity) -> Self {
        Self::Entity(value)
    }
}

/// CRUD and collection engine for one resource base path.
#[derive(Clone)]
pub struct ResourceClient {
    connection: Arc<dyn Connection>,
    resolver: UriResolver,
    monitor: TaskMonitor,
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("base_uri", &self.resolver.base_uri())
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    /// Create a client for the collection at `base_uri` (e.g. `/rest/interconnects`).
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, base_uri: impl Into<String>) -> Self {
        let monitor = TaskMonitor::new(Arc::clone(&connection));
        Self {
            connection,
            resolver: UriResolver::new(base_uri),
            monitor,
        }
    }

    /// Replace the task monitor.
    #[must_use]
    pub fn with_task_monitor(mut self, monitor: TaskMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Set the base interval between task polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.monitor = self.monitor.with_poll_interval(interval);
        self
    }

    /// The collection base path.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        self.resolver.base_uri()
    }

    /// The resolver bound to this collection.
    #[must_use]
    pub const fn uri_resolver(&self) -> &UriResolver {
        &self.resolver
    }

    /// The task monitor used to await mutations.
    #[must_use]
    pub const fn task_monitor(&self) -> &TaskMonitor {
        &self.monitor
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> Arc<dyn Connection> {
        Arc::clone(&self.connection)
    }

    /// Shorthand for [`UriResolver::build_uri`].
    ///
    /// # Errors
    ///
    /// See [`UriResolver::build_uri`].
    pub fn build_uri(&self, id_or_uri: &str) -> Result<String> {
        self.resolver.build_uri(id_or_uri)
    }

    /// Shorthand for [`UriResolver::build_subresource_uri`].
    ///
    /// # Errors
    ///
    /// See [`UriResolver::build_subresource_uri`].
    pub fn build_subresource_uri(
        &self,
        resource_id_or_uri: Option<&str>,
        subresource_id_or_uri: Option<&str>,
        subresource_path: &str,
    ) -> Result<String> {
        self.resolver
            .build_subresource_uri(resource_id_or_uri, subresource_id_or_uri, subresource_path)
    }

    /// Fetch one member by identifier or URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty input, [`Error::UnrecognizedUri`]
    /// for a URI of another collection, or the transport error.
    pub async fn get(&self, id_or_uri: &str) -> Result<Value> {
        let uri = self.resolver.build_uri(id_or_uri)?;
        self.connection.get(&uri).await
    }

    /// Read every page of a collection.
    ///
    /// `uri` overrides the collection endpoint and must lie under the base path. Pages
    /// are followed through `nextPageUri` until the link is absent, points back at the
    /// same page, or a non-negative `count` has been satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedUri`] for a foreign override, or the first
    /// transport error; no partial result is returned.
    pub async fn get_all(&self, query: &QuerySpec, uri: Option<&str>) -> Result<Vec<Value>> {
        let target = match uri {
            Some(uri) => {
                self.resolver.validate_resource_uri(uri)?;
                uri
            }
            None => self.resolver.base_uri(),
        };

        self.fetch_pages(query.append_to(target), query).await
    }

    /// Read the members of one collection page without following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty identifier, or the transport
    /// error.
    pub async fn get_collection(&self, id_or_uri: &str, filters: &[&str]) -> Result<Vec<Value>> {
        let uri = self.resolver.build_uri(id_or_uri)?;

        let mut params = QueryParams::new();
        params.push_each("filter", filters.iter().filter(|f| !f.is_empty()));

        let body = self.connection.get(&params.append_to(&uri)).await?;
        Ok(Page::from_value(body)?.members)
    }

    /// Read all members whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty field name and
    /// [`Error::UnrecognizedUri`] for a foreign `uri`.
    pub async fn get_by(&self, field: &str, value: &str, uri: Option<&str>) -> Result<Vec<Value>> {
        if field.is_empty() {
            return Err(Error::invalid_argument("field"));
        }

        let query = QuerySpec::new().with_filter(format!("\"'{field}'='{value}'\""));
        self.get_all(&query, uri.or(Some(self.resolver.base_uri())))
            .await
    }

    /// Return the first member named `name`, if any.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::get_by`].
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Value>> {
        let mut matches = self.get_by("name", name, None).await?;
        if matches.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matches.swap_remove(0)))
        }
    }

    /// Create a member by POSTing `resource` to the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty resource, or any transport or
    /// task error.
    pub async fn create(&self, resource: Entity, options: &RequestOptions) -> Result<Value> {
        if resource.is_empty() {
            return Err(Error::invalid_argument("resource"));
        }

        debug!(uri = %self.resolver.base_uri(), "Creating resource");
        let response = self
            .connection
            .post(
                self.resolver.base_uri(),
                Some(Value::Object(resource)),
                options.custom_headers.clone(),
            )
            .await?;
        self.finish(response, options.timeout).await
    }

    /// POST without a body to `uri`, or to the collection when `uri` is `None`.
    ///
    /// # Errors
    ///
    /// Returns any resolution, transport or task error.
    pub async fn create_with_zero_body(
        &self,
        uri: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Value> {
        let target = match uri {
            Some(uri) => self.resolver.resolve_target(uri)?,
            None => self.resolver.base_uri().to_string(),
        };

        let response = self
            .connection
            .post(&target, None, options.custom_headers.clone())
            .await?;
        self.finish(response, options.timeout).await
    }

    /// Replace a member with `resource`.
    ///
    /// The target is the resource's own `uri`, else `uri`, else the collection. With
    /// `options.force` the request carries `force=True`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty resource, or any transport or
    /// task error.
    pub async fn update(
        &self,
        resource: Entity,
        uri: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Value> {
        if resource.is_empty() {
            return Err(Error::invalid_argument("resource"));
        }

        let target = entity_uri(&resource)
            .or(uri)
            .unwrap_or_else(|| self.resolver.base_uri());
        let target = with_force(target, options.force);

        debug!(uri = %target, "Updating resource");
        let response = self
            .connection
            .put(
                &target,
                Some(Value::Object(resource)),
                options.custom_headers.clone(),
            )
            .await?;
        self.finish(response, options.timeout).await
    }

    /// PUT without a body to `uri_or_id`.
    ///
    /// # Errors
    ///
    /// Returns any resolution, transport or task error.
    pub async fn update_with_zero_body(
        &self,
        uri_or_id: &str,
        options: &RequestOptions,
    ) -> Result<Value> {
        let target = self.resolver.resolve_target(uri_or_id)?;
        let response = self
            .connection
            .put(&target, None, options.custom_headers.clone())
            .await?;
        self.finish(response, options.timeout).await
    }

    /// Apply a single JSON-Patch operation to a member.
    ///
    /// # Errors
    ///
    /// Returns any resolution, transport or task error.
    pub async fn patch(
        &self,
        id_or_uri: &str,
        operation: &str,
        path: &str,
        value: Value,
        options: &RequestOptions,
    ) -> Result<Value> {
        let body = json!([{ "op": operation, "path": path, "value": value }]);
        self.patch_request(id_or_uri, body, options).await
    }

    /// Send an arbitrary JSON-Patch document to a member.
    ///
    /// # Errors
    ///
    /// Returns any resolution, transport or task error.
    pub async fn patch_request(
        &self,
        id_or_uri: &str,
        body: Value,
        options: &RequestOptions,
    ) -> Result<Value> {
        let uri = self.resolver.build_uri(id_or_uri)?;

        debug!(uri = %uri, "Patching resource");
        let response = self
            .connection
            .patch(&uri, Some(body), options.custom_headers.clone())
            .await?;
        self.finish(response, options.timeout).await
    }

    /// Delete a member.
    ///
    /// Entities are deleted through their own `uri`, used verbatim; identifiers are
    /// resolved against the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty identifier or entity, or an
    /// entity without a usable `uri`, and any transport or task error.
    pub async fn delete<'a>(
        &self,
        resource: impl Into<ResourceRef<'a>>,
        options: &RequestOptions,
    ) -> Result<bool> {
        let uri = match resource.into() {
            ResourceRef::Id(id) => {
                if id.is_empty() {
                    return Err(Error::invalid_argument("resource"));
                }
                self.resolver.build_uri(id)?
            }
            ResourceRef::Entity(entity) => {
                if entity.is_empty() {
                    return Err(Error::invalid_argument("resource"));
                }
                entity_uri(entity)
                    .ok_or_else(|| Error::InvalidArgument("Unknown object type".to_string()))?
                    .to_string()
            }
        };
        let uri = with_force(&uri, options.force);

        debug!(uri = %uri, "Deleting resource");
        let response = self
            .connection
            .delete(&uri, options.custom_headers.clone())
            .await?;
        self.monitor.resolve(response, options.timeout).await?;
        Ok(true)
    }

    /// Delete every member matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty filter, and any transport or
    /// task error.
    pub async fn delete_all(&self, filter: &str, options: &RequestOptions) -> Result<bool> {
        if filter.is_empty() {
            return Err(Error::invalid_argument("filter"));
        }

        let mut params = QueryParams::new();
        params.push("filter", filter);
        if options.force {
            params.push("force", "True");
        }
        let uri = params.append_to(self.resolver.base_uri());

        debug!(uri = %uri, "Deleting matching resources");
        let response = self
            .connection
            .delete(&uri, options.custom_headers.clone())
            .await?;
        self.monitor.resolve(response, options.timeout).await?;
        Ok(true)
    }

    /// Fetch the collection's JSON schema.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn get_schema(&self) -> Result<Value> {
        let uri = format!("{}/schema", self.resolver.base_uri());
        self.connection.get(&uri).await
    }

    /// Fetch utilization samples of a member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty identifier, or the transport
    /// error.
    pub async fn get_utilization(&self, id_or_uri: &str, query: &UtilizationQuery) -> Result<Value> {
        let uri = format!("{}/utilization", self.resolver.build_uri(id_or_uri)?);
        self.connection.get(&query.to_params().append_to(&uri)).await
    }

    async fn fetch_pages(&self, first_uri: String, query: &QuerySpec) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first_uri);

        while let Some(uri) = next.take() {
            debug!(uri = %uri, collected = items.len(), "Fetching collection page");
            let page = Page::from_value(self.connection.get(&uri).await?)?;
            visited.insert(uri);

            let link = page
                .next_link()
                .filter(|link| !visited.contains(*link))
                .map(str::to_string);
            items.extend(page.members);

            if query.limit().is_some_and(|limit| items.len() >= limit) {
                break;
            }
            next = link;
        }

        Ok(items)
    }

    async fn finish(&self, response: Response, timeout: Timeout) -> Result<Value> {
        self.monitor
            .resolve(response, timeout)
            .await
            .map(TaskOutcome::into_value)
    }
}

fn with_force(uri: &str, force: bool) -> String {
    if force {
        append_query(uri, FORCE_QUERY)
    } else {
        uri.to_string()
    }
}
