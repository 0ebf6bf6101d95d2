/**
 * View Builder
 *
 * Registers a `RouteSpec` onto an axum router. The generated endpoint:
 *
 * 1. Runs the role gate when the spec declares an auth requirement; an
 *    anonymous or under-privileged request is answered 403 with the uniform
 *    body and never reaches the handler.
 * 2. For raw endpoints, hands the request over untouched.
 * 3. For service endpoints, extracts the JSON body (body-bearing method
 *    sets only), query parameters, path parameters, headers and the
 *    authenticated user into a `ServiceRequest`, then defers to the
 *    response builder with the spec's options.
 */

use std::collections::HashMap;

use axum::body::to_bytes;
use axum::extract::{FromRequestParts, Query, RawPathParams, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use serde_json::json;

use crate::app::state::AppState;
use crate::auth::principal::AuthUser;
use crate::respond::{build_response, json_response, not_authorized, BackgroundTasks, BuildOptions};
use crate::routing::route_spec::{Endpoint, RouteSpec, ServiceRequest};

/// Cap on buffered request bodies; larger payloads are answered 413.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Register one route descriptor onto the router.
pub fn build_view(router: Router<AppState>, spec: RouteSpec) -> Router<AppState> {
    let path = spec.path.clone();
    let filter = method_filter(&spec.methods);
    let handler = move |State(state): State<AppState>, request: Request| {
        let spec = spec.clone();
        async move { serve_route(state, spec, request).await }
    };
    router.route(&path, on(filter, handler))
}

fn method_filter(methods: &[Method]) -> MethodFilter {
    let mut filter: Option<MethodFilter> = None;
    for method in methods {
        let next = if *method == Method::GET {
            MethodFilter::GET
        } else if *method == Method::POST {
            MethodFilter::POST
        } else if *method == Method::PUT {
            MethodFilter::PUT
        } else if *method == Method::PATCH {
            MethodFilter::PATCH
        } else if *method == Method::DELETE {
            MethodFilter::DELETE
        } else if *method == Method::HEAD {
            MethodFilter::HEAD
        } else if *method == Method::OPTIONS {
            MethodFilter::OPTIONS
        } else {
            continue;
        };
        filter = Some(match filter {
            Some(acc) => acc.or(next),
            None => next,
        });
    }
    // A spec without methods defaults to POST, the service-layer norm.
    filter.unwrap_or(MethodFilter::POST)
}

async fn serve_route(state: AppState, spec: RouteSpec, request: Request) -> Response {
    if let Some(required) = &spec.auth {
        let authorized = request
            .extensions()
            .get::<AuthUser>()
            .map(|user| user.has_scope(required))
            .unwrap_or(false);
        if !authorized {
            tracing::warn!(path = %spec.path, scope = %required, "scope check failed");
            return not_authorized();
        }
    }

    let handler = match &spec.endpoint {
        Endpoint::Raw(handler) => return handler(request).await,
        Endpoint::Service(handler) => handler.clone(),
    };

    let (mut parts, body) = request.into_parts();

    let query_params = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(params)| params)
        .unwrap_or_default();
    let path_params = RawPathParams::from_request_parts(&mut parts, &state)
        .await
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let user = parts.extensions.get::<AuthUser>().cloned();

    let post_data = if spec.wants_body() {
        let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return json_response(
                    json!({"status": false, "msg": "Request body too large"}),
                    StatusCode::PAYLOAD_TOO_LARGE,
                    BackgroundTasks::new(),
                );
            }
        };
        if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(error = %e, "request body is not valid JSON");
                    return bad_request("Invalid JSON body");
                }
            }
        }
    } else {
        None
    };

    let service_request = ServiceRequest {
        post_data,
        query_params,
        headers: parts.headers,
        path_params,
        user,
    };
    let options = BuildOptions {
        error_status: spec.error_status,
        redirect: spec.redirect,
        redirect_key: spec.redirect_key.clone(),
        skip_db: spec.skip_db,
    };

    match build_response(&state, handler(service_request), options).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn bad_request(msg: &str) -> Response {
    json_response(
        json!({"status": false, "msg": msg}),
        StatusCode::BAD_REQUEST,
        BackgroundTasks::new(),
    )
}
