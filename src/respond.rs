/**
 * Response Builder
 *
 * This module awaits a service future, maps its envelope to an HTTP JSON
 * (or redirect) response, schedules background tasks and conditionally
 * manages the shared database connection's lifecycle around the request.
 *
 * # Algorithm
 *
 * 1. Per-request lifecycle (and the route not opted out): connect the
 *    shared database before awaiting the service future.
 * 2. Await the future; obtain a `ServiceResult`.
 * 3. Errors present: failure body, caller-specified error status, teardown
 *    task still scheduled.
 * 4. Otherwise queue each envelope task, FIFO.
 * 5. Redirect requested and the redirect key present in the payload:
 *    301 with `Location`, no JSON body.
 * 6. Otherwise success envelope, 200.
 * 7. Per-request lifecycle: append the connection teardown task last, so
 *    cleanup happens strictly after the response is sent.
 *
 * Business-logic errors always come back inside the envelope; only
 * infrastructure failures (the database connect, in this layer) escape as
 * `ServiceError`.
 *
 * # Task ordering
 *
 * Tasks are spawned onto the runtime only once the response value is
 * finalized, in one runner that executes them in FIFO order. They never
 * delay the response, and they are detached from the request: a client
 * disconnect does not cancel them.
 */

use std::future::Future;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::app::state::AppState;
use crate::db::ConnectionLifecycle;
use crate::envelope::{ServiceResult, Task};
use crate::error::ServiceError;

/// FIFO queue of deferred work attached to a response.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    tasks: Vec<Task>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn extend(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Detach the queue onto the runtime. Tasks run sequentially in the
    /// order they were added; an empty queue spawns nothing.
    fn spawn(self) {
        if self.tasks.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for task in self.tasks {
                task.run().await;
            }
        });
    }
}

/// Terminal JSON response constructor.
///
/// The task queue is detached only after the response value exists, which
/// is what guarantees tasks never run before the response is finalized.
pub fn json_response(body: Value, status: StatusCode, tasks: BackgroundTasks) -> Response {
    let response = (status, Json(body)).into_response();
    tasks.spawn();
    response
}

/// Terminal redirect response: 301 with `Location`, no body.
pub fn redirect_response(location: &str, tasks: BackgroundTasks) -> Response {
    let response = (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, location.to_string())],
    )
        .into_response();
    tasks.spawn();
    response
}

/// Uniform 403 body with a caller-supplied message.
pub fn forbidden(msg: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"status": false, "msg": msg})),
    )
        .into_response()
}

/// The conventional "Not Authorized" 403 used by the role gate and the
/// default exception path.
pub fn not_authorized() -> Response {
    forbidden("Not Authorized")
}

/// Per-route options consumed by [`build_response`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Status used when the envelope carries errors.
    pub error_status: StatusCode,
    /// Whether a success payload should redirect instead of rendering JSON.
    pub redirect: bool,
    /// Payload key holding the redirect target.
    pub redirect_key: Option<String>,
    /// Route opted out of automatic per-request database lifecycle.
    pub skip_db: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            error_status: StatusCode::BAD_REQUEST,
            redirect: false,
            redirect_key: None,
            skip_db: false,
        }
    }
}

/// Await a service future and render its envelope.
///
/// # Errors
///
/// Only the per-request database connect can fail here; the failure is
/// fatal for the request and propagates. Everything the service future
/// reports stays inside the envelope.
pub async fn build_response(
    state: &AppState,
    future: impl Future<Output = ServiceResult>,
    options: BuildOptions,
) -> Result<Response, ServiceError> {
    let database = state.database();
    let manage_db = state.lifecycle() == ConnectionLifecycle::PerRequest
        && !options.skip_db
        && database.is_some();

    if manage_db {
        if let Some(database) = &database {
            // Fatal on failure: a request that cannot reach the database
            // has no business-level answer.
            database.connect().await?;
        }
    }

    let mut result = future.await;

    let mut tasks = BackgroundTasks::new();
    if result.is_err() {
        if manage_db {
            tasks.add(teardown_task(state));
        }
        return Ok(json_response(result.as_body(), options.error_status, tasks));
    }

    tasks.extend(result.tasks.drain(..));
    if manage_db {
        tasks.add(teardown_task(state));
    }

    if options.redirect {
        if let (Some(key), Some(data)) = (&options.redirect_key, &result.data) {
            if let Some(location) = data.get(key).and_then(Value::as_str) {
                return Ok(redirect_response(location, tasks));
            }
        }
    }

    Ok(json_response(result.as_body(), StatusCode::OK, tasks))
}

fn teardown_task(state: &AppState) -> Task {
    let state = state.clone();
    Task::call(move || {
        let state = state.clone();
        async move {
            if let Some(database) = state.database() {
                database.disconnect().await;
            }
        }
    })
}
