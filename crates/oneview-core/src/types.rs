//! Core OneView domain types.
//!
//! Entities are schema-flexible JSON objects; only the fields the resource layer relies
//! on (`uri`, task state, paging links) get typed accessors.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

/// Prefix shared by every appliance resource URI.
pub const REST_PREFIX: &str = "/rest/";

/// One remote record as sent to or returned by the appliance.
pub type Entity = Map<String, Value>;

/// Extra request headers supplied by the caller.
pub type CustomHeaders = BTreeMap<String, String>;

/// Returns the `uri` field of an entity when it is a non-empty string.
#[must_use]
pub fn entity_uri(entity: &Entity) -> Option<&str> {
    entity
        .get("uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
}

/// Converts a response body into an [`Entity`].
///
/// A `null` body becomes an empty entity.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`] when the body is not a JSON object.
pub fn into_entity(value: Value) -> Result<Entity> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Entity::new()),
        other => Err(Error::InvalidResponse(format!(
            "expected a JSON object, got `{other}`"
        ))),
    }
}

/// Overlays each resource on top of `defaults`.
///
/// Values present in a resource always win; defaults only fill in missing keys.
#[must_use]
pub fn merge_default_values(resources: Vec<Entity>, defaults: &Entity) -> Vec<Entity> {
    resources
        .into_iter()
        .map(|resource| {
            let mut merged = defaults.clone();
            merged.extend(resource);
            merged
        })
        .collect()
}

/// One page of a collection read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Entities on this page, in server order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<Value>,
    /// Link to the following page.
    #[serde(default)]
    pub next_page_uri: Option<String>,
    /// URI of this page, when the appliance reports it.
    #[serde(default)]
    pub uri: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Page {
    /// Parses a collection response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the body is not a collection document.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|err| Error::InvalidResponse(format!("invalid collection page: {err}")))
    }

    /// Returns the link to follow, if pagination should continue.
    ///
    /// Empty links and links pointing back at this same page end the traversal.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        let next = self.next_page_uri.as_deref().filter(|uri| !uri.is_empty())?;
        if self.uri.as_deref() == Some(next) {
            return None;
        }
        Some(next)
    }
}

/// Lifecycle state reported in a task's `taskState` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Task was created
    New,
    /// Task is starting
    Starting,
    /// Task is queued
    Pending,
    /// Task is executing
    Running,
    /// Task is suspended
    Suspended,
    /// Task is stopping
    Stopping,
    /// Task finished successfully
    Completed,
    /// Task finished with warnings
    Warning,
    /// Task failed
    Error,
    /// Task was terminated
    Terminated,
    /// Task was killed
    Killed,
    /// Any state this client does not know about
    Unknown(String),
}

impl TaskState {
    /// Parses a `taskState` value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "New" => Self::New,
            "Starting" => Self::Starting,
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Suspended" => Self::Suspended,
            "Stopping" => Self::Stopping,
            "Completed" => Self::Completed,
            "Warning" => Self::Warning,
            "Error" => Self::Error,
            "Terminated" => Self::Terminated,
            "Killed" => Self::Killed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns true while the appliance is still working on the task.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(
            self,
            Self::New | Self::Starting | Self::Pending | Self::Running | Self::Suspended | Self::Stopping
        )
    }

    /// Returns true for terminal states that represent a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Terminated | Self::Killed)
    }
}

/// Handle to deferred work on the appliance.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle(Entity);

impl TaskHandle {
    /// Wraps a task payload.
    #[must_use]
    pub const fn new(payload: Entity) -> Self {
        Self(payload)
    }

    /// Builds a handle from a response body, if the body is a task document.
    #[must_use]
    pub fn from_body(body: &Value) -> Option<Self> {
        let map = body.as_object()?;
        let is_task = map.get("category").and_then(Value::as_str) == Some("tasks");
        is_task.then(|| Self(map.clone()))
    }

    /// URI used to poll the task.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        entity_uri(&self.0)
    }

    /// Current state of the task.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.str_field("taskState")
            .map_or_else(|| TaskState::Unknown(String::new()), TaskState::parse)
    }

    /// Task name, e.g. `Delete` or `Update`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Task resource type, e.g. `TaskResourceV2`.
    #[must_use]
    pub fn task_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// Completion percentage reported by the appliance.
    #[must_use]
    pub fn percent_complete(&self) -> Option<u64> {
        self.0.get("percentComplete").and_then(Value::as_u64)
    }

    /// URI of the resource the task operated on.
    #[must_use]
    pub fn associated_resource_uri(&self) -> Option<&str> {
        self.0
            .get("associatedResource")
            .and_then(|resource| resource.get("resourceUri"))
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
    }

    /// The `taskErrors` payload, or `null` when absent.
    #[must_use]
    pub fn errors(&self) -> Value {
        self.0.get("taskErrors").cloned().unwrap_or(Value::Null)
    }

    /// Borrow the raw task payload.
    #[must_use]
    pub const fn payload(&self) -> &Entity {
        &self.0
    }

    /// Consume the handle, returning the raw payload.
    #[must_use]
    pub fn into_payload(self) -> Entity {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Outcome of a mutating request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The appliance accepted the request and is working on it.
    Deferred(TaskHandle),
    /// The request completed synchronously with this body.
    Immediate(Value),
}

/// How long task-awaiting operations wait for completion.
///
/// The timeout only stops the client from waiting; the appliance keeps working on the
/// task regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Wait until the task reaches a terminal state.
    #[default]
    Unlimited,
    /// Return the unresolved task without polling.
    NoWait,
    /// Wait at most this many seconds.
    Seconds(u64),
}

impl Timeout {
    /// Deadline for the wait, if bounded.
    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Unlimited => None,
            Self::NoWait => Some(Duration::ZERO),
            Self::Seconds(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

impl From<i64> for Timeout {
    fn from(value: i64) -> Self {
        match value {
            v if v < 0 => Self::Unlimited,
            0 => Self::NoWait,
            v => Self::Seconds(v.unsigned_abs()),
        }
    }
}

/// Per-call options for mutating operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Task wait behaviour
    pub timeout: Timeout,
    /// Ask the appliance to bypass state and concurrency checks
    pub force: bool,
    /// Extra headers forwarded to the transport
    pub custom_headers: Option<CustomHeaders>,
}

impl RequestOptions {
    /// Options with an unlimited wait, no force flag and no extra headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Set the force flag.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Add a custom header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers
            .get_or_insert_with(CustomHeaders::new)
            .insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        into_entity(value).unwrap()
    }

    #[test]
    fn test_timeout_from_sentinel() {
        assert_eq!(Timeout::from(-1), Timeout::Unlimited);
        assert_eq!(Timeout::from(-30), Timeout::Unlimited);
        assert_eq!(Timeout::from(0), Timeout::NoWait);
        assert_eq!(Timeout::from(10), Timeout::Seconds(10));
        assert_eq!(Timeout::default(), Timeout::Unlimited);
        assert_eq!(Timeout::Seconds(3).duration(), Some(Duration::from_secs(3)));
        assert_eq!(Timeout::Unlimited.duration(), None);
    }

    #[test]
    fn test_entity_uri_ignores_empty() {
        assert_eq!(entity_uri(&entity(json!({"uri": "/rest/a/1"}))), Some("/rest/a/1"));
        assert_eq!(entity_uri(&entity(json!({"uri": ""}))), None);
        assert_eq!(entity_uri(&entity(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_into_entity_rejects_arrays() {
        assert!(into_entity(Value::Null).unwrap().is_empty());
        assert!(matches!(
            into_entity(json!([1, 2])),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_merge_default_values_keeps_given_values() {
        let defaults = entity(json!({"type": "port"}));
        let ports = vec![
            entity(json!({"type": "port2", "portName": "d1"})),
            entity(json!({"portName": "d2"})),
        ];

        let merged = merge_default_values(ports, &defaults);
        assert_eq!(Value::Object(merged[0].clone()), json!({"type": "port2", "portName": "d1"}));
        assert_eq!(Value::Object(merged[1].clone()), json!({"type": "port", "portName": "d2"}));
    }

    #[test]
    fn test_page_parsing() {
        let page = Page::from_value(json!({
            "members": [{"id": "1"}],
            "nextPageUri": "/rest/x?start=1&count=1",
            "uri": "/rest/x?start=0&count=1"
        }))
        .unwrap();
        assert_eq!(page.members.len(), 1);
        assert_eq!(page.next_link(), Some("/rest/x?start=1&count=1"));

        let last = Page::from_value(json!({"members": null, "nextPageUri": null})).unwrap();
        assert!(last.members.is_empty());
        assert_eq!(last.next_link(), None);

        assert_eq!(Page::from_value(json!({})).unwrap(), Page::default());
    }

    #[test]
    fn test_page_stops_on_self_link() {
        let page = Page::from_value(json!({
            "members": [],
            "nextPageUri": "/rest/x?start=0",
            "uri": "/rest/x?start=0"
        }))
        .unwrap();
        assert_eq!(page.next_link(), None);
    }

    #[test]
    fn test_task_handle_accessors() {
        let task = TaskHandle::from_body(&json!({
            "category": "tasks",
            "uri": "/rest/tasks/1",
            "taskState": "Running",
            "percentComplete": 40,
            "associatedResource": {"resourceUri": "/rest/interconnects/1"}
        }))
        .unwrap();

        assert_eq!(task.uri(), Some("/rest/tasks/1"));
        assert_eq!(task.state(), TaskState::Running);
        assert!(task.state().is_running());
        assert_eq!(task.percent_complete(), Some(40));
        assert_eq!(task.associated_resource_uri(), Some("/rest/interconnects/1"));
        assert_eq!(task.errors(), Value::Null);

        assert!(TaskHandle::from_body(&json!({"uri": "/rest/interconnects/1"})).is_none());
    }

    #[test]
    fn test_task_state_classification() {
        assert!(TaskState::parse("Error").is_failure());
        assert!(TaskState::parse("Killed").is_failure());
        assert!(!TaskState::parse("Warning").is_failure());
        assert!(!TaskState::parse("Completed").is_running());
        assert_eq!(TaskState::parse("Odd"), TaskState::Unknown("Odd".to_string()));
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .with_timeout(60_i64)
            .with_force(true)
            .with_header("Accept-Language", "en_US");

        assert_eq!(options.timeout, Timeout::Seconds(60));
        assert!(options.force);
        assert_eq!(
            options.custom_headers.unwrap().get("Accept-Language").map(String::as_str),
            Some("en_US")
        );
    }
}
