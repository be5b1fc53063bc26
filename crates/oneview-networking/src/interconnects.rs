//! Interconnect modules installed in enclosures.

use std::sync::Arc;

use oneview_core::{
    merge_default_values, Connection, Entity, QuerySpec, RequestOptions, Resource, ResourceClient,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::Result;

/// Collection URI of interconnects.
pub const INTERCONNECTS_URI: &str = "/rest/interconnects";

/// One interconnect, addressed through its `uri`.
///
/// Lookups return a new [`Interconnect`]; the remaining operations act on the loaded
/// entity and fail with [`oneview_core::Error::InvalidArgument`] until one is loaded.
#[derive(Debug, Clone)]
pub struct Interconnect {
    resource: Resource,
}

impl Interconnect {
    /// An empty interconnect handle on `connection`.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::from_client(ResourceClient::new(connection, INTERCONNECTS_URI))
    }

    /// An empty interconnect handle sharing `client`.
    #[must_use]
    pub fn from_client(client: ResourceClient) -> Self {
        Self {
            resource: Resource::new(client),
        }
    }

    /// A handle over already known interconnect data.
    #[must_use]
    pub fn with_data(client: ResourceClient, data: Entity) -> Self {
        Self {
            resource: Resource::with_data(client, data),
        }
    }

    /// Current interconnect data.
    #[must_use]
    pub const fn data(&self) -> &Entity {
        self.resource.data()
    }

    /// The underlying facade.
    #[must_use]
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    fn wrap(resource: Resource) -> Self {
        Self { resource }
    }

    /// Load the interconnect at `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error for a URI outside `/rest/interconnects` or a failed request.
    pub async fn get_by_uri(&self, uri: &str) -> Result<Self> {
        self.resource.get_by_uri(uri).await.map(Self::wrap)
    }

    /// Load the first interconnect named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Self>> {
        Ok(self.resource.get_by_name(name).await?.map(Self::wrap))
    }

    /// Interconnects whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection query fails.
    pub async fn get_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        self.resource.get_by(field, value).await
    }

    /// Read the interconnect collection.
    ///
    /// # Errors
    ///
    /// Returns an error when any page request fails.
    pub async fn get_all(&self, query: &QuerySpec) -> Result<Vec<Value>> {
        self.resource.get_all(query, None).await
    }

    /// Re-fetch the loaded interconnect.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or the request fails.
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.resource.refresh().await?;
        Ok(self)
    }

    /// Statistics of the interconnect, or of one of its ports.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or the request fails.
    pub async fn get_statistics(&self, port_name: Option<&str>) -> Result<Value> {
        let mut uri = format!("{}/statistics", self.resource.load_resource()?);
        if let Some(port) = port_name.filter(|port| !port.is_empty()) {
            uri.push('/');
            uri.push_str(port);
        }
        self.resource.do_get(&uri).await
    }

    /// Statistics of one subport.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or the request fails.
    pub async fn get_subport_statistics(&self, port_name: &str, subport: u32) -> Result<Value> {
        let base = self.resource.client().build_uri(self.resource.load_resource()?)?;
        let uri = format!("{base}/statistics/{port_name}/subport/{subport}");
        self.resource.do_get(&uri).await
    }

    /// Name servers known to the interconnect.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or the request fails.
    pub async fn get_name_servers(&self) -> Result<Value> {
        let uri = format!("{}/nameServers", self.resource.load_resource()?);
        self.resource.do_get(&uri).await
    }

    /// Apply one JSON-Patch operation and reload the interconnect.
    ///
    /// The appliance accepts patches of `powerState`, `uidState` and `deviceResetState`.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn patch(
        &mut self,
        operation: &str,
        path: &str,
        value: Value,
        options: &RequestOptions,
    ) -> Result<&mut Self> {
        self.resource.patch(operation, path, value, options).await?;
        Ok(self)
    }

    /// Update one port.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn update_port(&self, port: Entity, options: &RequestOptions) -> Result<Value> {
        let uri = format!("{}/ports", self.resource.load_resource()?);
        self.resource
            .do_put(&uri, Value::Object(port), options)
            .await
    }

    /// Update several ports at once; each port defaults to `"type": "port"`.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn update_ports(&self, ports: Vec<Entity>, options: &RequestOptions) -> Result<Value> {
        let uri = format!("{}/update-ports", self.resource.load_resource()?);
        let defaults = port_defaults();
        let body: Vec<Value> = merge_default_values(ports, &defaults)
            .into_iter()
            .map(Value::Object)
            .collect();

        debug!(uri = %uri, ports = body.len(), "Updating interconnect ports");
        self.resource.do_put(&uri, Value::Array(body), options).await
    }

    /// Reset port protection on every interconnect of the logical interconnect.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn reset_port_protection(&self, options: &RequestOptions) -> Result<Value> {
        let uri = format!("{}/resetportprotection", self.resource.load_resource()?);
        self.resource.update_with_zero_body(&uri, options).await
    }

    /// Reset the interconnect statistics.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn reset_statistics(&self, options: &RequestOptions) -> Result<Value> {
        let uri = format!("{}/statistics/reset", self.resource.load_resource()?);
        self.resource.update_with_zero_body(&uri, options).await
    }

    /// Ports of the interconnect.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or any page request fails.
    pub async fn get_ports(&self, start: u64, count: i64) -> Result<Vec<Value>> {
        let uri = self.resource.client().build_subresource_uri(
            Some(self.resource.load_resource()?),
            None,
            "ports",
        )?;
        self.resource
            .get_all(&QuerySpec::page(start, count), Some(&uri))
            .await
    }

    /// One port, by identifier or URI.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the port URI belongs to another
    /// interconnect, or the request fails.
    pub async fn get_port(&self, port_id_or_uri: &str) -> Result<Value> {
        let uri = self.resource.client().build_subresource_uri(
            Some(self.resource.load_resource()?),
            Some(port_id_or_uri),
            "ports",
        )?;
        self.resource.do_get(&uri).await
    }

    /// Pluggable module (transceiver) information.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded or the request fails.
    pub async fn get_pluggable_module_information(&self) -> Result<Value> {
        let uri = format!("{}/pluggableModuleInformation", self.resource.load_resource()?);
        self.resource.do_get(&uri).await
    }

    /// Reapply the appliance configuration to the interconnect.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is loaded, the request fails or the task fails.
    pub async fn update_configuration(&self, options: &RequestOptions) -> Result<Value> {
        let uri = format!("{}/configuration", self.resource.load_resource()?);
        self.resource.update_with_zero_body(&uri, options).await
    }
}

fn port_defaults() -> Entity {
    let mut defaults = Entity::new();
    defaults.insert("type".to_string(), json!("port"));
    defaults
}
