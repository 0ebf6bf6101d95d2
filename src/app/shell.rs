/**
 * Application Assembly
 *
 * `ServiceApp` composes the authentication backend, CORS, the generated
 * routes and the database lifecycle hooks into a ready-to-serve axum
 * router.
 *
 * # Assembly Steps
 *
 * 1. Resolve the lifecycle policy from the serverless flag.
 * 2. Construct (or adopt) the shared database resource.
 * 3. Register every `RouteSpec` through the view builder.
 * 4. Layer the authentication middleware when a verifier is configured.
 * 5. Layer permissive CORS when enabled.
 *
 * Startup/shutdown hooks connect and disconnect the database exactly once
 * for persistent deployments; serverless deployments manage the connection
 * per request inside the response builder instead.
 */

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::app::config::AppSettings;
use crate::app::state::AppState;
use crate::auth::backend::{authenticate, TokenVerifier};
use crate::auth::principal::{DefaultPrincipalAdapter, PrincipalAdapter};
use crate::db::{ConnectionLifecycle, Database, ModelInitializer};
use crate::error::ServiceError;
use crate::routing::{build_view, RouteSpec};

/// Initialize the global tracing subscriber from `RUST_LOG`.
///
/// Call once from the binary entry point, before building the application.
pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();
}

/// A fully assembled application.
pub struct ServiceApp {
    state: AppState,
    router: Router,
}

impl ServiceApp {
    pub fn builder(settings: AppSettings) -> ServiceAppBuilder {
        ServiceAppBuilder {
            settings,
            routes: Vec::new(),
            verifier: None,
            adapter: Arc::new(DefaultPrincipalAdapter),
            database: None,
            initializer: None,
        }
    }

    /// Clone of the assembled router, ready for `axum::serve` or for
    /// in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Startup hook: persistent deployments connect the shared database
    /// exactly once here.
    pub async fn startup(&self) -> Result<(), ServiceError> {
        if self.state.lifecycle() == ConnectionLifecycle::Persistent {
            if let Some(database) = self.state.database() {
                database.connect().await?;
            }
        }
        Ok(())
    }

    /// Shutdown hook, mirroring [`startup`](Self::startup).
    pub async fn shutdown(&self) {
        if self.state.lifecycle() == ConnectionLifecycle::Persistent {
            if let Some(database) = self.state.database() {
                database.disconnect().await;
            }
        }
    }

    /// Bind and serve, running the startup/shutdown hooks around the
    /// listener's lifetime. The shutdown hook runs whether serving ended
    /// cleanly or with an error, so a persistent pool is always closed.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
        self.startup().await?;
        let served = async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Listening on {}", addr);
            axum::serve(listener, self.router.clone()).await?;
            Ok(())
        }
        .await;
        self.shutdown().await;
        served
    }
}

/// Builder for [`ServiceApp`].
pub struct ServiceAppBuilder {
    settings: AppSettings,
    routes: Vec<RouteSpec>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    adapter: Arc<dyn PrincipalAdapter>,
    database: Option<Arc<Database>>,
    initializer: Option<Arc<dyn ModelInitializer>>,
}

impl ServiceAppBuilder {
    /// Add one route descriptor.
    pub fn route(mut self, spec: RouteSpec) -> Self {
        self.routes.push(spec);
        self
    }

    /// Add a batch of route descriptors (a service layer).
    pub fn routes(mut self, specs: impl IntoIterator<Item = RouteSpec>) -> Self {
        self.routes.extend(specs);
        self
    }

    /// Install the token verifier; without one the application serves
    /// anonymously and role-gated routes reject everything.
    pub fn verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replace the default principal adaptation.
    pub fn adapter(mut self, adapter: Arc<dyn PrincipalAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Adopt an externally constructed database resource instead of
    /// building one from the settings URL. Useful when a service layer
    /// needs the same handle.
    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Model initializer invoked at connect time (ignored when an external
    /// database resource was adopted).
    pub fn model_initializer(mut self, initializer: Arc<dyn ModelInitializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn build(self) -> ServiceApp {
        let lifecycle = if self.settings.serverless {
            ConnectionLifecycle::PerRequest
        } else {
            ConnectionLifecycle::Persistent
        };

        let database = self.database.or_else(|| {
            self.settings.database_url.as_ref().map(|url| {
                Arc::new(Database::new(
                    url.clone(),
                    self.settings.replica_database_url.clone(),
                    self.initializer.clone(),
                ))
            })
        });

        let cors = self.settings.cors;
        let has_verifier = self.verifier.is_some();
        let state = AppState::new(
            self.settings,
            database,
            lifecycle,
            self.verifier,
            self.adapter,
        );

        let mut router: Router<AppState> = Router::new();
        for spec in self.routes {
            router = build_view(router, spec);
        }
        if has_verifier {
            router = router.layer(middleware::from_fn_with_state(state.clone(), authenticate));
        }
        let mut router = router.with_state(state.clone());
        if cors {
            // All origins, methods and headers, matching the source
            // convention for these services.
            router = router.layer(CorsLayer::permissive());
        }

        ServiceApp { state, router }
    }
}
