//! Authentication Module
//!
//! Bearer-token authentication for service routes.
//!
//! # Architecture
//!
//! - **`principal`** - verified principal, adapted credential pair, role gate
//! - **`backend`** - header extraction, the [`TokenVerifier`] delegate and
//!   the axum middleware that wires them together
//!
//! # Per-request state machine
//!
//! No `Authorization` header means "anonymous": the request proceeds with no
//! identity attached, and any role-gated route rejects it later. A present
//! header is stripped of its `Bearer` scheme and handed to the injected
//! [`TokenVerifier`]; failures of any kind are normalized into the
//! application's configured 403 message, successes are adapted by the
//! [`PrincipalAdapter`] and attached to the request extensions.

/// Verified principal and credential adaptation
pub mod principal;

/// Token verification middleware
pub mod backend;

pub use backend::{authenticate, strip_bearer, TokenVerifier};
pub use principal::{
    AuthUser, Authenticated, DefaultPrincipalAdapter, PrincipalAdapter, VerifiedPrincipal,
};
