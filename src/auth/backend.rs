/**
 * Authentication Backend
 *
 * This module provides the middleware that turns a bearer token into an
 * authenticated principal. Actual principal resolution is delegated to an
 * injected `TokenVerifier`: it decodes the token, looks up the underlying
 * user record and derives the role set. Whatever that callback fails with
 * is normalized into a single 403 with the application's configured
 * message, so internal decode detail never leaks to the client.
 */

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::app::state::AppState;
use crate::auth::principal::VerifiedPrincipal;
use crate::error::ServiceError;
use crate::respond::forbidden;

/// Scheme prefix stripped from the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

/// Resolves a bearer token into a verified principal.
///
/// Implementations decode the token, look up the user record behind it and
/// derive the role set ("authenticated", plus "staff"/"admin" when account
/// state allows and the token carries an audience claim).
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    async fn verify_access_token(
        &self,
        bearer_token: &str,
    ) -> Result<VerifiedPrincipal, ServiceError>;
}

/// Strip the `Bearer` scheme from a header value.
///
/// Mirrors the lenient convention of the service layer: the scheme word is
/// removed wherever it appears and surrounding whitespace is trimmed, so
/// `"Bearer abc"` and `"abc"` both yield `"abc"`.
pub fn strip_bearer(header_value: &str) -> &str {
    header_value
        .trim()
        .strip_prefix(BEARER_SCHEME)
        .unwrap_or(header_value)
        .trim()
}

/// Authentication middleware.
///
/// 1. Absent `Authorization` header: the request proceeds anonymously.
/// 2. Present header: the bearer token is stripped and handed to the
///    injected verifier.
/// 3. Verifier failure: the request is answered 403 with the configured
///    message and never reaches the handler.
/// 4. Verifier success: the principal is adapted and attached to the
///    request extensions for the role gate and handlers.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(verifier) = state.verifier() else {
        return next.run(request).await;
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let Some(header) = header else {
        // Anonymous, not an error. Role-gated routes reject later.
        return next.run(request).await;
    };

    let bearer_token = strip_bearer(header).to_string();
    match verifier.verify_access_token(&bearer_token).await {
        Ok(principal) => {
            let user = state.adapter().adapt(principal);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "bearer token rejected");
            forbidden(state.auth_error_msg())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("  Bearer   abc  "), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("Bearer"), "");
    }
}
