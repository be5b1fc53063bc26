//! FCoE networks.

use std::sync::Arc;

use oneview_core::{
    merge_default_values, Connection, Entity, QuerySpec, RequestOptions, ResourceClient,
    ResourceRef,
};
use serde_json::{json, Value};

use crate::Result;

/// Collection URI of FCoE networks.
pub const FCOE_NETWORKS_URI: &str = "/rest/fcoe-networks";

/// Client for the FCoE network collection.
#[derive(Debug, Clone)]
pub struct FcoeNetworks {
    client: ResourceClient,
}

impl FcoeNetworks {
    /// FCoE networks reachable through `connection`.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::from_client(ResourceClient::new(connection, FCOE_NETWORKS_URI))
    }

    /// Wrap an existing client for `/rest/fcoe-networks`.
    #[must_use]
    pub const fn from_client(client: ResourceClient) -> Self {
        Self { client }
    }

    /// The underlying collection client.
    #[must_use]
    pub const fn client(&self) -> &ResourceClient {
        &self.client
    }

    /// Read the collection.
    ///
    /// # Errors
    ///
    /// Returns an error when any page request fails.
    pub async fn get_all(&self, query: &QuerySpec) -> Result<Vec<Value>> {
        self.client.get_all(query, None).await
    }

    /// One network by identifier or URI.
    ///
    /// # Errors
    ///
    /// Returns an error for a foreign URI or a failed request.
    pub async fn get(&self, id_or_uri: &str) -> Result<Value> {
        self.client.get(id_or_uri).await
    }

    /// Networks whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection query fails.
    pub async fn get_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        self.client.get_by(field, value, None).await
    }

    /// The first network named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Value>> {
        self.client.get_by_name(name).await
    }

    /// Create a network; `type` defaults to `fcoe-network`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request or its task fails.
    pub async fn create(&self, network: Entity, options: &RequestOptions) -> Result<Value> {
        self.client.create(with_defaults(network), options).await
    }

    /// Replace a network; `type` defaults to `fcoe-network`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request or its task fails.
    pub async fn update(&self, network: Entity, options: &RequestOptions) -> Result<Value> {
        self.client.update(with_defaults(network), None, options).await
    }

    /// Delete a network given its identifier, URI or entity.
    ///
    /// # Errors
    ///
    /// Returns an error when the request or its task fails.
    pub async fn delete<'a>(
        &self,
        network: impl Into<ResourceRef<'a>>,
        options: &RequestOptions,
    ) -> Result<bool> {
        self.client.delete(network, options).await
    }
}

fn with_defaults(network: Entity) -> Entity {
    let mut defaults = Entity::new();
    defaults.insert("type".to_string(), json!("fcoe-network"));

    merge_default_values(vec![network], &defaults)
        .pop()
        .unwrap_or(defaults)
}
