/**
 * Application State Management
 *
 * This module defines the shared state container and the `FromRef`
 * implementations for axum state extraction.
 *
 * # Thread Safety
 *
 * The state is a cheap `Arc` clone per request. The database handle inside
 * carries its own interior locking; the verifier and adapter are resolved
 * once at startup and only read afterwards.
 */

use std::sync::Arc;

use axum::extract::FromRef;

use crate::app::config::AppSettings;
use crate::auth::backend::TokenVerifier;
use crate::auth::principal::PrincipalAdapter;
use crate::db::{ConnectionLifecycle, Database};
use crate::token::TokenCodec;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    settings: AppSettings,
    database: Option<Arc<Database>>,
    lifecycle: ConnectionLifecycle,
    verifier: Option<Arc<dyn TokenVerifier>>,
    adapter: Arc<dyn PrincipalAdapter>,
    codec: TokenCodec,
}

impl AppState {
    pub fn new(
        settings: AppSettings,
        database: Option<Arc<Database>>,
        lifecycle: ConnectionLifecycle,
        verifier: Option<Arc<dyn TokenVerifier>>,
        adapter: Arc<dyn PrincipalAdapter>,
    ) -> Self {
        let codec = TokenCodec::new(&settings.secret_key, &settings.jwt_issuer);
        Self {
            inner: Arc::new(StateInner {
                settings,
                database,
                lifecycle,
                verifier,
                adapter,
                codec,
            }),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    /// The shared database resource, if one is configured.
    pub fn database(&self) -> Option<Arc<Database>> {
        self.inner.database.clone()
    }

    pub fn lifecycle(&self) -> ConnectionLifecycle {
        self.inner.lifecycle
    }

    pub fn verifier(&self) -> Option<Arc<dyn TokenVerifier>> {
        self.inner.verifier.clone()
    }

    pub fn adapter(&self) -> &dyn PrincipalAdapter {
        self.inner.adapter.as_ref()
    }

    /// The application token codec (settings-derived secret and issuer).
    pub fn codec(&self) -> &TokenCodec {
        &self.inner.codec
    }

    pub fn auth_error_msg(&self) -> &str {
        &self.inner.settings.auth_error_msg
    }
}

/// Allow handlers to extract the token codec directly.
impl FromRef<AppState> for TokenCodec {
    fn from_ref(state: &AppState) -> Self {
        state.inner.codec.clone()
    }
}

/// Allow handlers to extract the optional database handle directly.
impl FromRef<AppState> for Option<Arc<Database>> {
    fn from_ref(state: &AppState) -> Self {
        state.database()
    }
}
