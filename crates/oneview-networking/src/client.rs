//! Entry point bundling an authenticated connection with the networking resources.

use std::sync::Arc;
use std::time::Duration;

use oneview_core::{Connection, HttpConnection, OneViewConfig, ResourceClient};
use tracing::info;

use crate::fcoe_networks::{FcoeNetworks, FCOE_NETWORKS_URI};
use crate::interconnects::{Interconnect, INTERCONNECTS_URI};
use crate::Result;

/// One appliance session shared by every resource handle it hands out.
#[derive(Debug, Clone)]
pub struct OneViewClient {
    connection: Arc<HttpConnection>,
    poll_interval: Duration,
}

impl OneViewClient {
    /// Build the transport from `config` and log in when credentials are present.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from building the transport, or the login failure.
    pub async fn connect(config: &OneViewConfig) -> Result<Self> {
        let connection = HttpConnection::from_config(config)?;
        if config.credentials.is_some() {
            connection.login().await?;
        }

        info!(
            url = %connection.base_url(),
            api_version = connection.api_version(),
            "Connected to OneView"
        );
        Ok(Self::from_connection(connection, config.task_poll_interval()))
    }

    /// Use an already prepared connection.
    #[must_use]
    pub fn from_connection(connection: HttpConnection, poll_interval: Duration) -> Self {
        Self {
            connection: Arc::new(connection),
            poll_interval,
        }
    }

    /// The shared transport.
    #[must_use]
    pub const fn connection(&self) -> &Arc<HttpConnection> {
        &self.connection
    }

    fn resource_client(&self, base_uri: &str) -> ResourceClient {
        let connection: Arc<dyn Connection> = self.connection.clone();
        ResourceClient::new(connection, base_uri).with_poll_interval(self.poll_interval)
    }

    /// An empty interconnect handle; load one with a lookup.
    #[must_use]
    pub fn interconnects(&self) -> Interconnect {
        Interconnect::from_client(self.resource_client(INTERCONNECTS_URI))
    }

    /// The FCoE network collection.
    #[must_use]
    pub fn fcoe_networks(&self) -> FcoeNetworks {
        FcoeNetworks::from_client(self.resource_client(FCOE_NETWORKS_URI))
    }

    /// Close the login session.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the logout request.
    pub async fn logout(&self) -> Result<()> {
        self.connection.logout().await
    }
}
