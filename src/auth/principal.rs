/**
 * Verified Principal and Credential Adaptation
 *
 * A successful token verification yields a `VerifiedPrincipal`: an opaque
 * user handle plus a derived role set. Different deployments want different
 * credential shapes downstream (plain role strings vs. rich user objects),
 * so the principal is mapped into the `AuthUser` pair consumed by the role
 * gate through a `PrincipalAdapter` resolved at startup.
 */

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::Value;

use crate::error::ServiceError;

/// Outcome of token verification: an opaque user handle and the roles
/// derived from account state and token claims.
#[derive(Debug, Clone)]
pub struct VerifiedPrincipal {
    /// Opaque user handle (whatever shape the verifier produces).
    pub principal: Value,
    /// Derived role names, e.g. "authenticated", "staff", "admin".
    pub roles: Vec<String>,
}

impl VerifiedPrincipal {
    pub fn new(principal: Value, roles: Vec<String>) -> Self {
        Self { principal, roles }
    }
}

/// Credential/identity pair attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Authorization scopes checked by role-gated routes.
    pub credentials: Vec<String>,
    /// Identity object handed to service functions.
    pub identity: Value,
}

impl AuthUser {
    /// Whether this user carries the given scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.credentials.iter().any(|c| c == scope)
    }

    /// Fetch a string field from the identity object.
    pub fn identity_str(&self, key: &str) -> Option<&str> {
        self.identity.get(key).and_then(Value::as_str)
    }
}

/// Maps a verified principal into the credential/identity pair the role
/// gate expects.
///
/// Implementations are named and resolved at application startup.
pub trait PrincipalAdapter: Send + Sync + 'static {
    fn adapt(&self, principal: VerifiedPrincipal) -> AuthUser;
}

/// Default adaptation: roles become the credential scopes, the opaque
/// principal becomes the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrincipalAdapter;

impl PrincipalAdapter for DefaultPrincipalAdapter {
    fn adapt(&self, principal: VerifiedPrincipal) -> AuthUser {
        AuthUser {
            credentials: principal.roles,
            identity: principal.principal,
        }
    }
}

/// Extractor for handlers that require an authenticated user.
///
/// Rejects with the uniform 403 body when the auth middleware attached no
/// identity.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthUser);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| {
                tracing::warn!("AuthUser not found in request extensions");
                ServiceError::authentication("Not Authorized")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_adapter_uses_roles_as_credentials() {
        let principal = VerifiedPrincipal::new(
            json!({"email": "shola@example.com"}),
            vec!["authenticated".to_string(), "staff".to_string()],
        );
        let user = DefaultPrincipalAdapter.adapt(principal);
        assert!(user.has_scope("authenticated"));
        assert!(user.has_scope("staff"));
        assert!(!user.has_scope("admin"));
        assert_eq!(user.identity_str("email"), Some("shola@example.com"));
    }
}
