//! Waiting on asynchronous appliance tasks.
//!
//! Mutating calls may answer with a task document instead of the finished entity. The
//! [`TaskMonitor`] polls such tasks until they reach a terminal state and then resolves
//! them to whatever the caller actually asked for: the created or updated entity, a
//! deletion acknowledgement, or the raw task payload.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{into_entity, Entity, Response, TaskHandle, Timeout};

/// Default delay between two task polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for the growing poll delay.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Number of polls after which the delay grows by one base interval.
const POLLS_PER_STEP: u32 = 10;

/// Task names whose completion means the target resource is gone.
const DELETE_TASK_NAMES: [&str; 4] = [
    "Delete",
    "Remove",
    "Delete server hardware type",
    "Remove SAN manager",
];

const SUPPORT_DUMPS_PREFIX: &str = "/rest/appliance/support-dumps/";

/// What an awaited mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The resulting entity, or the synchronous response body.
    Completed(Value),
    /// The task removed its resource.
    Deleted,
    /// The caller asked not to wait; the task is still running.
    Pending(TaskHandle),
}

impl TaskOutcome {
    /// Flattens the outcome into a JSON value.
    ///
    /// `Deleted` becomes `true` and a pending task becomes its payload.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Completed(value) => value,
            Self::Deleted => Value::Bool(true),
            Self::Pending(task) => Value::Object(task.into_payload()),
        }
    }
}

/// Polls appliance tasks through a [`Connection`].
#[derive(Clone)]
pub struct TaskMonitor {
    connection: Arc<dyn Connection>,
    poll_interval: Duration,
    max_poll_interval: Duration,
}

impl std::fmt::Debug for TaskMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_interval", &self.max_poll_interval)
            .finish_non_exhaustive()
    }
}

impl TaskMonitor {
    /// Create a monitor with the default poll intervals.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }

    /// Set the base poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.max_poll_interval = self.max_poll_interval.max(interval);
        self
    }

    /// Set the cap for the growing poll interval.
    #[must_use]
    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval.max(self.poll_interval);
        self
    }

    /// Resolves the response of a mutating call.
    ///
    /// Immediate bodies are returned unchanged; deferred tasks are awaited.
    ///
    /// # Errors
    ///
    /// See [`Self::wait_for_task`].
    pub async fn resolve(&self, response: Response, timeout: Timeout) -> Result<TaskOutcome> {
        match response {
            Response::Immediate(body) => Ok(TaskOutcome::Completed(body)),
            Response::Deferred(task) => self.wait_for_task(task, timeout).await,
        }
    }

    /// Waits for a task and resolves it to its result.
    ///
    /// With [`Timeout::NoWait`] the task is returned without polling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskError`] when the task fails, [`Error::Timeout`] when the
    /// wait exceeds `timeout`, and [`Error::InvalidArgument`] for a task without a
    /// `uri`. Transport errors are propagated unchanged.
    pub async fn wait_for_task(&self, task: TaskHandle, timeout: Timeout) -> Result<TaskOutcome> {
        if timeout == Timeout::NoWait {
            return Ok(TaskOutcome::Pending(task));
        }

        let task = self.wait_until_terminal(&task, timeout).await?;

        if task.name().is_some_and(|name| DELETE_TASK_NAMES.contains(&name)) {
            return Ok(TaskOutcome::Deleted);
        }

        if task.task_type().is_some_and(|kind| kind.starts_with("Task")) {
            return self
                .get_associated_resource(&task)
                .await
                .map(TaskOutcome::Completed);
        }

        warn!(
            task_type = task.task_type().unwrap_or_default(),
            "Task completed with an unrecognized payload, returning it as-is"
        );
        Ok(TaskOutcome::Completed(Value::Object(task.into_payload())))
    }

    /// Waits for a task and returns its final payload, without following the
    /// associated resource.
    ///
    /// # Errors
    ///
    /// Same as [`Self::wait_for_task`].
    pub async fn get_completed_task(&self, task: &TaskHandle, timeout: Timeout) -> Result<Entity> {
        self.wait_until_terminal(task, timeout)
            .await
            .map(TaskHandle::into_payload)
    }

    /// Fetches the entity a task operated on.
    ///
    /// A task without an associated resource yields an empty object; support dumps
    /// resolve to their URI.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_associated_resource(&self, task: &TaskHandle) -> Result<Value> {
        let Some(uri) = task.associated_resource_uri() else {
            return Ok(Value::Object(Entity::new()));
        };

        if uri.starts_with(SUPPORT_DUMPS_PREFIX) {
            return Ok(Value::String(uri.to_string()));
        }

        self.connection.get(uri).await
    }

    async fn wait_until_terminal(&self, task: &TaskHandle, timeout: Timeout) -> Result<TaskHandle> {
        let uri = task
            .uri()
            .ok_or_else(|| Error::InvalidArgument("Unknown object type".to_string()))?
            .to_string();

        let limit = timeout.duration();
        let started = Instant::now();
        let mut interval = self.poll_interval;
        let mut polls: u32 = 0;

        loop {
            let current = TaskHandle::new(into_entity(self.connection.get(&uri).await?)?);
            let state = current.state();
            debug!(
                uri = %uri,
                state = ?state,
                percent_complete = ?current.percent_complete(),
                "Polled task"
            );

            if !state.is_running() {
                if state.is_failure() {
                    return Err(task_error(&current));
                }
                return Ok(current);
            }

            if let Some(limit) = limit {
                if started.elapsed() >= limit {
                    return Err(Error::Timeout(format!(
                        "Waited {} seconds for task to complete, aborting",
                        limit.as_secs()
                    )));
                }
            }

            polls += 1;
            if polls % POLLS_PER_STEP == 0 {
                interval = (interval + self.poll_interval).min(self.max_poll_interval);
            }
            sleep(interval).await;
        }
    }
}

fn task_error(task: &TaskHandle) -> Error {
    let errors = task.errors();
    let first = errors.as_array().and_then(|list| list.first());

    let message = first
        .and_then(|err| err.get("message"))
        .and_then(Value::as_str)
        .or_else(|| task.payload().get("taskStatus").and_then(Value::as_str))
        .unwrap_or("Unknown Exception")
        .to_string();

    let error_code = first
        .and_then(|err| err.get("errorCode"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Error::TaskError {
        message,
        error_code,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockConnection;
    use mockall::predicate::eq;
    use serde_json::json;

    fn task(value: Value) -> TaskHandle {
        TaskHandle::new(into_entity(value).unwrap())
    }

    fn running() -> Value {
        json!({
            "category": "tasks",
            "uri": "/rest/tasks/1",
            "type": "TaskResourceV2",
            "taskState": "Running",
            "percentComplete": 50
        })
    }

    fn completed(resource_uri: &str) -> Value {
        json!({
            "category": "tasks",
            "uri": "/rest/tasks/1",
            "type": "TaskResourceV2",
            "name": "Update",
            "taskState": "Completed",
            "associatedResource": {"resourceUri": resource_uri}
        })
    }

    fn monitor(mock: MockConnection) -> TaskMonitor {
        TaskMonitor::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn immediate_response_is_returned_unchanged() {
        let monitor = monitor(MockConnection::new());
        let body = json!({"uri": "/rest/testuri/1"});

        let outcome = monitor
            .resolve(Response::Immediate(body.clone()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed(body));
    }

    #[tokio::test]
    async fn no_wait_returns_task_without_polling() {
        let monitor = monitor(MockConnection::new());
        let handle = task(running());

        let outcome = monitor
            .wait_for_task(handle.clone(), Timeout::NoWait)
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Pending(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_completed_and_fetches_resource() {
        let mut mock = MockConnection::new();
        let mut sequence = mockall::Sequence::new();
        mock.expect_get()
            .with(eq("/rest/tasks/1"))
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(running()));
        mock.expect_get()
            .with(eq("/rest/tasks/1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(completed("/rest/interconnects/1")));
        mock.expect_get()
            .with(eq("/rest/interconnects/1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(json!({"uri": "/rest/interconnects/1", "name": "ic"})));

        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(
            outcome.into_value(),
            json!({"uri": "/rest/interconnects/1", "name": "ic"})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_wait_grows_interval_up_to_cap() {
        let mut mock = MockConnection::new();
        let mut sequence = mockall::Sequence::new();
        mock.expect_get()
            .with(eq("/rest/tasks/1"))
            .times(200)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(running()));
        mock.expect_get()
            .with(eq("/rest/tasks/1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(completed("/rest/interconnects/1")));
        mock.expect_get()
            .with(eq("/rest/interconnects/1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(json!({"uri": "/rest/interconnects/1"})));

        let started = Instant::now();
        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        // 9 x 1s, then ten polls each at 2s..=10s, then 101 polls at the 10s cap
        let expected: u64 = 9 + (2..=10).map(|step| step * 10).sum::<u64>() + 101 * 10;
        assert_eq!(expected, 1559);
        assert_eq!(started.elapsed(), Duration::from_secs(expected));
        assert_eq!(
            outcome,
            TaskOutcome::Completed(json!({"uri": "/rest/interconnects/1"}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_times_out() {
        let mut mock = MockConnection::new();
        mock.expect_get().returning(|_| Ok(running()));

        let err = monitor(mock)
            .wait_for_task(task(running()), Timeout::Seconds(5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::Timeout("Waited 5 seconds for task to complete, aborting".to_string())
        );
    }

    #[tokio::test]
    async fn failed_task_carries_first_error() {
        let mut mock = MockConnection::new();
        mock.expect_get().times(1).returning(|_| {
            Ok(json!({
                "uri": "/rest/tasks/1",
                "taskState": "Error",
                "taskErrors": [
                    {"errorCode": "INTERCONNECT_FAILED", "message": "Port is offline"},
                    {"message": "second"}
                ]
            }))
        });

        let err = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap_err();

        match err {
            Error::TaskError {
                message,
                error_code,
                errors,
            } => {
                assert_eq!(message, "Port is offline");
                assert_eq!(error_code.as_deref(), Some("INTERCONNECT_FAILED"));
                assert_eq!(errors.as_array().map(Vec::len), Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_task_falls_back_to_status_text() {
        let mut mock = MockConnection::new();
        mock.expect_get().returning(|_| {
            Ok(json!({"uri": "/rest/tasks/1", "taskState": "Killed", "taskStatus": "Killed by user"}))
        });
        let err = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskError { ref message, .. } if message == "Killed by user"));

        let mut mock = MockConnection::new();
        mock.expect_get()
            .returning(|_| Ok(json!({"uri": "/rest/tasks/1", "taskState": "Terminated"})));
        let err = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskError { ref message, .. } if message == "Unknown Exception"));
    }

    #[tokio::test]
    async fn warning_state_counts_as_success() {
        let mut mock = MockConnection::new();
        mock.expect_get().with(eq("/rest/tasks/1")).returning(|_| {
            Ok(json!({
                "uri": "/rest/tasks/1",
                "type": "TaskResourceV2",
                "taskState": "Warning",
                "associatedResource": {"resourceUri": ""}
            }))
        });

        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed(json!({})));
    }

    #[tokio::test]
    async fn delete_task_yields_deleted() {
        let mut mock = MockConnection::new();
        mock.expect_get().returning(|_| {
            Ok(json!({
                "uri": "/rest/tasks/1",
                "type": "TaskResourceV2",
                "name": "Delete",
                "taskState": "Completed"
            }))
        });

        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Deleted);
        assert_eq!(outcome.into_value(), Value::Bool(true));
    }

    #[tokio::test]
    async fn support_dump_resolves_to_uri() {
        let mut mock = MockConnection::new();
        mock.expect_get().times(1).returning(|_| {
            Ok(completed("/rest/appliance/support-dumps/dump.sdmp"))
        });

        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TaskOutcome::Completed(json!("/rest/appliance/support-dumps/dump.sdmp"))
        );
    }

    #[tokio::test]
    async fn non_task_payload_is_returned_as_is() {
        let mut mock = MockConnection::new();
        mock.expect_get().returning(|_| {
            Ok(json!({"uri": "/rest/tasks/1", "type": "BackupV2", "taskState": "Completed"}))
        });

        let outcome = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(
            outcome.into_value(),
            json!({"uri": "/rest/tasks/1", "type": "BackupV2", "taskState": "Completed"})
        );
    }

    #[tokio::test]
    async fn completed_task_payload_is_not_resolved() {
        let mut mock = MockConnection::new();
        mock.expect_get()
            .times(1)
            .returning(|_| Ok(completed("/rest/interconnects/1")));

        let payload = monitor(mock)
            .get_completed_task(&task(running()), Timeout::Unlimited)
            .await
            .unwrap();

        assert_eq!(payload.get("taskState"), Some(&json!("Completed")));
    }

    #[tokio::test]
    async fn task_without_uri_is_rejected() {
        let err = monitor(MockConnection::new())
            .wait_for_task(task(json!({"taskState": "Running"})), Timeout::Unlimited)
            .await
            .unwrap_err();

        assert_eq!(err, Error::InvalidArgument("Unknown object type".to_string()));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut mock = MockConnection::new();
        mock.expect_get()
            .returning(|_| Err(Error::ServiceUnavailable("down".to_string())));

        let err = monitor(mock)
            .wait_for_task(task(running()), Timeout::Unlimited)
            .await
            .unwrap_err();

        assert_eq!(err, Error::ServiceUnavailable("down".to_string()));
    }
}
