//! Stateful wrapper around one appliance entity.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::query::QuerySpec;
use crate::resource::ResourceClient;
use crate::types::{entity_uri, into_entity, Entity, RequestOptions};

/// One entity plus the client of its collection.
///
/// Mutating verbs replace [`Self::data`] with the appliance's answer and return the
/// facade for chaining. Reads that do not identify a single entity leave it untouched.
#[derive(Debug, Clone)]
pub struct Resource {
    client: ResourceClient,
    data: Entity,
}

impl Resource {
    /// An empty facade, to be filled by a lookup or a create.
    #[must_use]
    pub fn new(client: ResourceClient) -> Self {
        Self {
            client,
            data: Entity::new(),
        }
    }

    /// A facade over known entity data.
    #[must_use]
    pub const fn with_data(client: ResourceClient, data: Entity) -> Self {
        Self { client, data }
    }

    /// Current entity data.
    #[must_use]
    pub const fn data(&self) -> &Entity {
        &self.data
    }

    /// Consume the facade, returning its data.
    #[must_use]
    pub fn into_data(self) -> Entity {
        self.data
    }

    /// The collection client.
    #[must_use]
    pub const fn client(&self) -> &ResourceClient {
        &self.client
    }

    /// The entity's `uri`, if it has one.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        entity_uri(&self.data)
    }

    /// Returns the entity's URI, failing when the facade does not identify an entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `data` has no `uri`.
    pub fn load_resource(&self) -> Result<&str> {
        self.uri().ok_or_else(|| {
            Error::InvalidArgument("resource data has no `uri`; fetch or create it first".to_string())
        })
    }

    fn sibling(&self, data: Entity) -> Self {
        Self::with_data(self.client.clone(), data)
    }

    /// Fetch the entity at `uri` into a new facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedUri`] for a foreign URI, or the transport error.
    pub async fn get_by_uri(&self, uri: &str) -> Result<Self> {
        self.client.uri_resolver().validate_resource_uri(uri)?;
        let body = self.client.get(uri).await?;
        Ok(self.sibling(into_entity(body)?))
    }

    /// Collection members whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// See [`ResourceClient::get_by`].
    pub async fn get_by(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        self.client.get_by(field, value, None).await
    }

    /// Facade over the first member named `name`.
    ///
    /// # Errors
    ///
    /// See [`ResourceClient::get_by_name`].
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Self>> {
        match self.client.get_by_name(name).await? {
            Some(found) => Ok(Some(self.sibling(into_entity(found)?))),
            None => Ok(None),
        }
    }

    /// Read the collection.
    ///
    /// # Errors
    ///
    /// See [`ResourceClient::get_all`].
    pub async fn get_all(&self, query: &QuerySpec, uri: Option<&str>) -> Result<Vec<Value>> {
        self.client.get_all(query, uri).await
    }

    /// Create `data` on the appliance and load the created entity.
    ///
    /// # Errors
    ///
    /// See [`ResourceClient::create`].
    pub async fn create(&mut self, data: Entity, options: &RequestOptions) -> Result<&mut Self> {
        let created = self.client.create(data, options).await?;
        self.data = into_entity(created)?;
        Ok(self)
    }

    /// Apply `changes` on top of the current data and PUT the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the facade has no `uri`, or any error of
    /// [`ResourceClient::update`].
    pub async fn update(&mut self, changes: Entity, options: &RequestOptions) -> Result<&mut Self> {
        let uri = self.load_resource()?.to_string();

        let mut merged = self.data.clone();
        merged.extend(changes);

        let updated = self.client.update(merged, Some(&uri), options).await?;
        self.data = into_entity(updated)?;
        Ok(self)
    }

    /// Delete the entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the facade has no `uri`, or any error of
    /// [`ResourceClient::delete`].
    pub async fn delete(&self, options: &RequestOptions) -> Result<bool> {
        self.load_resource()?;
        self.client.delete(&self.data, options).await
    }

    /// Re-fetch the entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the facade has no `uri`, or the transport
    /// error.
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        let uri = self.load_resource()?.to_string();
        let body = self.client.get(&uri).await?;
        self.data = into_entity(body)?;
        Ok(self)
    }

    /// Apply one JSON-Patch operation, then reload the entity.
    ///
    /// # Errors
    ///
    /// See [`Self::patch_request`].
    pub async fn patch(
        &mut self,
        operation: &str,
        path: &str,
        value: Value,
        options: &RequestOptions,
    ) -> Result<&mut Self> {
        let body = json!([{ "op": operation, "path": path, "value": value }]);
        self.patch_request(body, options).await
    }

    /// Send a JSON-Patch document, then reload the entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the facade has no `uri`, or any
    /// transport or task error.
    pub async fn patch_request(&mut self, body: Value, options: &RequestOptions) -> Result<&mut Self> {
        let uri = self.load_resource()?.to_string();
        self.client.patch_request(&uri, body, options).await?;
        self.refresh().await
    }

    /// GET a URI below the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedUri`] for a foreign URI, or the transport error.
    pub async fn do_get(&self, uri: &str) -> Result<Value> {
        self.client.uri_resolver().validate_resource_uri(uri)?;
        self.client.connection().get(uri).await
    }

    /// PUT `body` to a URI below the collection and await the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedUri`] for a foreign URI, or any transport or task
    /// error.
    pub async fn do_put(&self, uri: &str, body: Value, options: &RequestOptions) -> Result<Value> {
        self.client.uri_resolver().validate_resource_uri(uri)?;
        let response = self
            .client
            .connection()
            .put(uri, Some(body), options.custom_headers.clone())
            .await?;
        self.client
            .task_monitor()
            .resolve(response, options.timeout)
            .await
            .map(crate::task::TaskOutcome::into_value)
    }

    /// PUT without a body to `uri` and await the result.
    ///
    /// # Errors
    ///
    /// See [`ResourceClient::update_with_zero_body`].
    pub async fn update_with_zero_body(&self, uri: &str, options: &RequestOptions) -> Result<Value> {
        self.client.update_with_zero_body(uri, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockConnection;
    use crate::types::{CustomHeaders, Response};
    use mockall::predicate::{always, eq};
    use std::sync::Arc;

    fn facade(mock: MockConnection) -> Resource {
        Resource::new(ResourceClient::new(Arc::new(mock), "/rest/testuri"))
    }

    fn loaded(mock: MockConnection, data: Value) -> Resource {
        Resource::with_data(
            ResourceClient::new(Arc::new(mock), "/rest/testuri"),
            into_entity(data).unwrap(),
        )
    }

    #[tokio::test]
    async fn get_by_uri_loads_entity() {
        let mut mock = MockConnection::new();
        mock.expect_get()
            .with(eq("/rest/testuri/1"))
            .times(1)
            .returning(|_| Ok(json!({"uri": "/rest/testuri/1", "name": "one"})));

        let resource = facade(mock).get_by_uri("/rest/testuri/1").await.unwrap();
        assert_eq!(resource.uri(), Some("/rest/testuri/1"));
        assert_eq!(resource.data().get("name"), Some(&json!("one")));
    }

    #[tokio::test]
    async fn get_by_uri_rejects_foreign_uri() {
        let err = facade(MockConnection::new())
            .get_by_uri("/rest/other/1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnrecognizedUri(_)));
    }

    #[tokio::test]
    async fn get_by_name_wraps_first_match() {
        let mut mock = MockConnection::new();
        mock.expect_get()
            .times(1)
            .returning(|_| Ok(json!({"members": [{"name": "x", "uri": "/rest/testuri/9"}]})));

        let found = facade(mock).get_by_name("x").await.unwrap().unwrap();
        assert_eq!(found.uri(), Some("/rest/testuri/9"));
    }

    #[tokio::test]
    async fn create_replaces_data() {
        let mut mock = MockConnection::new();
        mock.expect_post()
            .with(eq("/rest/testuri"), eq(Some(json!({"name": "new"}))), always())
            .times(1)
            .returning(|_, _, _| {
                Ok(Response::Immediate(json!({"name": "new", "uri": "/rest/testuri/2"})))
            });

        let mut resource = facade(mock);
        resource
            .create(into_entity(json!({"name": "new"})).unwrap(), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(resource.uri(), Some("/rest/testuri/2"));
    }

    #[tokio::test]
    async fn update_merges_changes_into_current_data() {
        let mut mock = MockConnection::new();
        mock.expect_put()
            .with(
                eq("/rest/testuri/1"),
                eq(Some(json!({"uri": "/rest/testuri/1", "name": "renamed", "type": "t"}))),
                eq(None::<CustomHeaders>),
            )
            .times(1)
            .returning(|_, _, _| {
                Ok(Response::Immediate(json!({"uri": "/rest/testuri/1", "name": "renamed"})))
            });

        let mut resource = loaded(mock, json!({"uri": "/rest/testuri/1", "name": "old", "type": "t"}));
        resource
            .update(into_entity(json!({"name": "renamed"})).unwrap(), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(
            Value::Object(resource.data().clone()),
            json!({"uri": "/rest/testuri/1", "name": "renamed"})
        );
    }

    #[tokio::test]
    async fn operations_need_a_loaded_entity() {
        let mut resource = facade(MockConnection::new());

        assert!(matches!(resource.load_resource(), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            resource.refresh().await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resource.delete(&RequestOptions::new()).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn patch_reloads_entity_afterwards() {
        let mut mock = MockConnection::new();
        let mut sequence = mockall::Sequence::new();
        mock.expect_patch()
            .with(
                eq("/rest/testuri/1"),
                eq(Some(json!([{"op": "replace", "path": "/powerState", "value": "On"}]))),
                always(),
            )
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(Response::Immediate(json!({"partial": true}))));
        mock.expect_get()
            .with(eq("/rest/testuri/1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(json!({"uri": "/rest/testuri/1", "powerState": "On"})));

        let mut resource = loaded(mock, json!({"uri": "/rest/testuri/1", "powerState": "Off"}));
        resource
            .patch("replace", "/powerState", json!("On"), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(resource.data().get("powerState"), Some(&json!("On")));
        assert!(resource.data().get("partial").is_none());
    }

    #[tokio::test]
    async fn delete_uses_entity_uri() {
        let mut mock = MockConnection::new();
        mock.expect_delete()
            .with(eq("/rest/testuri/1"), always())
            .times(1)
            .returning(|_, _| Ok(Response::Immediate(Value::Null)));

        let resource = loaded(mock, json!({"uri": "/rest/testuri/1"}));
        assert!(resource.delete(&RequestOptions::new()).await.unwrap());
    }

    #[tokio::test]
    async fn do_get_and_do_put_stay_inside_collection() {
        let mut mock = MockConnection::new();
        mock.expect_get()
            .with(eq("/rest/testuri/1/statistics"))
            .times(1)
            .returning(|_| Ok(json!({"ports": []})));
        mock.expect_put()
            .with(eq("/rest/testuri/1/ports"), eq(Some(json!({"a": 1}))), always())
            .times(1)
            .returning(|_, _, _| Ok(Response::Immediate(json!({"uri": "/rest/testuri/1"}))));

        let resource = loaded(mock, json!({"uri": "/rest/testuri/1", "name": "kept"}));
        assert_eq!(
            resource.do_get("/rest/testuri/1/statistics").await.unwrap(),
            json!({"ports": []})
        );
        resource
            .do_put("/rest/testuri/1/ports", json!({"a": 1}), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(resource.data().get("name"), Some(&json!("kept")));

        assert!(matches!(
            resource.do_get("/rest/other/1").await,
            Err(Error::UnrecognizedUri(_))
        ));
    }
}
