/**
 * Route Descriptors
 *
 * A `RouteSpec` is the static configuration describing how a service
 * function becomes an HTTP endpoint: path, method set, handler, optional
 * auth requirement, redirect policy and database-lifecycle opt-out. Specs
 * are created once at application boot and are read-only afterwards.
 *
 * # Calling convention
 *
 * Service endpoints receive a `ServiceRequest` - the parsed JSON body (for
 * body-bearing method sets), query parameters, headers, path parameters and
 * the authenticated user, when one is attached - and resolve to a
 * `ServiceResult` envelope.
 *
 * Raw endpoints are the escape hatch for routes needing full control over
 * the response (template rendering, custom redirects): they bypass the
 * envelope machinery entirely and produce an axum `Response` directly.
 */

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::auth::backend::strip_bearer;
use crate::auth::principal::AuthUser;
use crate::envelope::ServiceResult;

/// Boxed service-function invocation.
pub type ServiceFuture = BoxFuture<'static, ServiceResult>;

/// A service-layer function wrapped for routing.
pub type ServiceHandler = Arc<dyn Fn(ServiceRequest) -> ServiceFuture + Send + Sync>;

/// An escape-hatch handler producing a raw response.
pub type RawHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// The two endpoint shapes a route can carry.
#[derive(Clone)]
pub enum Endpoint {
    /// Standard envelope-producing service function.
    Service(ServiceHandler),
    /// Raw handler bypassing the envelope machinery.
    Raw(RawHandler),
}

/// Everything a service function sees of the request.
#[derive(Debug, Clone, Default)]
pub struct ServiceRequest {
    /// Parsed JSON body, present only for body-bearing method sets.
    pub post_data: Option<Value>,
    /// Query string, decoded.
    pub query_params: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters captured by the route pattern.
    pub path_params: HashMap<String, String>,
    /// Authenticated user, when the auth middleware attached one.
    pub user: Option<AuthUser>,
}

impl ServiceRequest {
    /// Fetch a field from the JSON body.
    pub fn post_field(&self, key: &str) -> Option<&Value> {
        self.post_data.as_ref().and_then(|data| data.get(key))
    }

    /// Fetch a non-empty string field from the JSON body.
    pub fn post_str(&self, key: &str) -> Option<&str> {
        self.post_field(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Fetch a non-empty query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params
            .get(key)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Fetch a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Extract a bearer token from the named header, stripping the scheme.
    ///
    /// Used both for the standard `Authorization` header and for the
    /// alternate provider/staff header conventions.
    pub fn bearer_from(&self, name: &str) -> Option<String> {
        self.header(name)
            .map(strip_bearer)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

/// Static description of one endpoint.
#[derive(Clone)]
pub struct RouteSpec {
    /// Route path, in axum syntax (`/users/{id}`).
    pub path: String,
    /// Accepted HTTP methods.
    pub methods: Vec<Method>,
    /// The handler.
    pub endpoint: Endpoint,
    /// Required scope; `None` leaves the route open.
    pub auth: Option<String>,
    /// Respond with a redirect when the payload carries the redirect key.
    pub redirect: bool,
    /// Payload key holding the redirect target.
    pub redirect_key: Option<String>,
    /// Opt out of automatic per-request database lifecycle.
    pub skip_db: bool,
    /// Status used when the envelope carries errors.
    pub error_status: StatusCode,
}

impl RouteSpec {
    /// Describe a standard service endpoint.
    pub fn service<F, Fut>(path: impl Into<String>, methods: Vec<Method>, f: F) -> Self
    where
        F: Fn(ServiceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let handler: ServiceHandler = Arc::new(move |request| Box::pin(f(request)));
        Self {
            path: path.into(),
            methods,
            endpoint: Endpoint::Service(handler),
            auth: None,
            redirect: false,
            redirect_key: None,
            skip_db: false,
            error_status: StatusCode::BAD_REQUEST,
        }
    }

    /// Describe a raw endpoint bypassing the envelope machinery.
    pub fn raw<F, Fut>(path: impl Into<String>, methods: Vec<Method>, f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler: RawHandler = Arc::new(move |request| Box::pin(f(request)));
        Self {
            path: path.into(),
            methods,
            endpoint: Endpoint::Raw(handler),
            auth: None,
            redirect: false,
            redirect_key: None,
            skip_db: false,
            error_status: StatusCode::BAD_REQUEST,
        }
    }

    /// Require a scope; unauthenticated or under-privileged requests never
    /// reach the handler.
    pub fn auth(mut self, scope: impl Into<String>) -> Self {
        self.auth = Some(scope.into());
        self
    }

    /// Redirect to the value found at `key` in the success payload.
    pub fn redirect(mut self, key: impl Into<String>) -> Self {
        self.redirect = true;
        self.redirect_key = Some(key.into());
        self
    }

    /// Opt out of automatic per-request database lifecycle management.
    pub fn skip_db(mut self) -> Self {
        self.skip_db = true;
        self
    }

    /// Override the status used for error envelopes (default 400).
    pub fn error_status(mut self, status: StatusCode) -> Self {
        self.error_status = status;
        self
    }

    /// Whether the method set includes a body-bearing verb.
    pub fn wants_body(&self) -> bool {
        self.methods
            .iter()
            .any(|m| *m == Method::POST || *m == Method::PUT || *m == Method::PATCH)
    }
}
