/**
 * Result Envelope
 *
 * This module defines the uniform outcome type returned by every service
 * function, plus the background task descriptor consumed by the response
 * builder.
 *
 * # Envelope Convention
 *
 * Every service function resolves to a `ServiceResult` carrying exactly one
 * of an error map or a success payload, plus an ordered list of background
 * tasks. The response builder renders it as:
 *
 * - Success: `{"status": true, "data": {...}}` (the `data` key is omitted
 *   when the payload is empty) with HTTP 200
 * - Failure: `{"status": false, ...errors merged at top level}` with a
 *   failure status (400 by default)
 *
 * Envelopes are created fresh per invocation and consumed exactly once.
 */

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Boxed future produced by a background task invocation.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callable stored inside a [`Task`].
///
/// Receives the positional arguments and the keyword-argument map the task
/// was constructed with.
pub type TaskFn = Arc<dyn Fn(Vec<Value>, Map<String, Value>) -> TaskFuture + Send + Sync>;

/// A unit of deferred work scheduled strictly after the HTTP response has
/// been finalized.
///
/// A task is a tagged triple of callable, positional arguments and keyword
/// arguments, constructed explicitly by the caller:
///
/// - [`Task::call`] - zero-argument form wrapping a plain async closure
/// - [`Task::with_args`] - positional arguments only
/// - [`Task::with_kwargs`] - positional arguments plus a keyword map
///
/// Tasks in one envelope run in FIFO order within a single runner. There is
/// no concurrency control between tasks touching the same resource.
#[derive(Clone)]
pub struct Task {
    callable: TaskFn,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl Task {
    /// Wrap a zero-argument async closure as a task.
    pub fn call<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callable: TaskFn = Arc::new(move |_args, _kwargs| Box::pin(f()) as TaskFuture);
        Self {
            callable,
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Build a task from a callable and positional arguments.
    ///
    /// Invocation is `f(args, {})`.
    pub fn with_args(callable: TaskFn, args: Vec<Value>) -> Self {
        Self {
            callable,
            args,
            kwargs: Map::new(),
        }
    }

    /// Build a task from a callable, positional arguments and a trailing
    /// keyword-argument map.
    ///
    /// Invocation is `f(args, kwargs)`.
    pub fn with_kwargs(callable: TaskFn, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            callable,
            args,
            kwargs,
        }
    }

    /// Positional arguments this task will be invoked with.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments this task will be invoked with.
    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    /// Invoke the task.
    pub async fn run(self) {
        (self.callable)(self.args, self.kwargs).await;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .finish_non_exhaustive()
    }
}

/// Uniform tri-state outcome of a service function.
///
/// Invariant: at most one of `errors`/`data` carries the payload; the
/// presence of `errors` always produces a failure HTTP status.
#[derive(Debug, Default)]
pub struct ServiceResult {
    /// Field-level error map, merged into the failure body at top level.
    pub errors: Option<Map<String, Value>>,
    /// Success payload, rendered under the `data` key.
    pub data: Option<Map<String, Value>>,
    /// Background tasks, executed FIFO after the response is sent.
    pub tasks: Vec<Task>,
}

impl ServiceResult {
    /// Successful result with no payload: `{"status": true}`.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Successful result with a payload.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Failed result with a field-level error map.
    pub fn with_errors(errors: Map<String, Value>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    /// Failed result with the conventional single-message shape
    /// `{"msg": ...}`.
    pub fn error_msg(msg: impl Into<String>) -> Self {
        let mut errors = Map::new();
        errors.insert("msg".to_string(), Value::String(msg.into()));
        Self::with_errors(errors)
    }

    /// Append a background task.
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Append several background tasks, preserving order.
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Whether this result carries errors.
    pub fn is_err(&self) -> bool {
        self.errors.is_some()
    }

    /// Render the wire body for this result.
    ///
    /// Success bodies are `{"status": true}` plus a `data` key when the
    /// payload is non-empty. Failure bodies are `{"status": false}` with
    /// every error field merged at top level.
    pub fn as_body(&self) -> Value {
        let mut body = Map::new();
        match &self.errors {
            Some(errors) => {
                body.insert("status".to_string(), Value::Bool(false));
                for (key, value) in errors {
                    body.insert(key.clone(), value.clone());
                }
            }
            None => {
                body.insert("status".to_string(), Value::Bool(true));
                if let Some(data) = &self.data {
                    if !data.is_empty() {
                        body.insert("data".to_string(), Value::Object(data.clone()));
                    }
                }
            }
        }
        Value::Object(body)
    }
}

/// Convert a `json!({...})` literal into the map form the envelope expects.
///
/// Non-object values produce an empty map; the envelope convention only
/// deals in JSON objects.
pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[test]
    fn test_success_body_without_data() {
        let result = ServiceResult::ok();
        assert_eq!(result.as_body(), json!({"status": true}));
    }

    #[test]
    fn test_success_body_with_data() {
        let result = ServiceResult::with_data(fields(json!({"name": "shola"})));
        assert_eq!(
            result.as_body(),
            json!({"status": true, "data": {"name": "shola"}})
        );
    }

    #[test]
    fn test_empty_data_key_is_omitted() {
        let result = ServiceResult::with_data(Map::new());
        assert_eq!(result.as_body(), json!({"status": true}));
    }

    #[test]
    fn test_error_fields_merged_at_top_level() {
        let result =
            ServiceResult::with_errors(fields(json!({"msg": "Bad info", "field": "email"})));
        assert!(result.is_err());
        assert_eq!(
            result.as_body(),
            json!({"status": false, "msg": "Bad info", "field": "email"})
        );
    }

    #[test]
    fn test_error_msg_shape() {
        let result = ServiceResult::error_msg("Not Authorized");
        assert_eq!(
            result.as_body(),
            json!({"status": false, "msg": "Not Authorized"})
        );
    }

    #[tokio::test]
    async fn test_task_with_kwargs_invocation() {
        let seen: Arc<Mutex<Vec<(Vec<Value>, Map<String, Value>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let callable: TaskFn = Arc::new(move |args, kwargs| {
            let recorder = recorder.clone();
            Box::pin(async move {
                recorder.lock().unwrap().push((args, kwargs));
            }) as TaskFuture
        });

        let task = Task::with_kwargs(
            callable.clone(),
            vec![json!(22)],
            fields(json!({"age": 33})),
        );
        task.run().await;

        let task = Task::with_args(callable, vec![json!(2)]);
        task.run().await;

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, vec![json!(22)]);
        assert_eq!(calls[0].1, fields(json!({"age": 33})));
        assert_eq!(calls[1].0, vec![json!(2)]);
        assert!(calls[1].1.is_empty());
    }

    #[tokio::test]
    async fn test_zero_argument_task() {
        let notify = Arc::new(Notify::new());
        let signal = notify.clone();
        let task = Task::call(move || {
            let signal = signal.clone();
            async move {
                signal.notify_one();
            }
        });
        assert!(task.args().is_empty());
        assert!(task.kwargs().is_empty());
        task.run().await;
        notify.notified().await;
    }
}
