//! Saxum - JSON Service Toolkit for Axum
//!
//! Saxum packages the conventions shared by a family of small JSON API
//! services: a uniform response envelope, background-task dispatch after the
//! response is sent, bearer-token authentication with pluggable principal
//! resolution, declarative route descriptors and an explicit database
//! lifecycle that works both in long-running and serverless deployments.
//!
//! # Overview
//!
//! Service functions are plain async functions resolving to a
//! [`ServiceResult`](envelope::ServiceResult): either a success payload or a
//! field-level error map, plus an ordered list of background tasks. The
//! routing layer renders the envelope onto the wire:
//!
//! - success: `{"status": true, "data": {...}}`, HTTP 200
//! - failure: `{"status": false, ...errors}`, HTTP 400 (configurable)
//! - auth failure: `{"status": false, "msg": ...}`, HTTP 403
//! - redirect routes: HTTP 301 with `Location`
//!
//! # Module Structure
//!
//! - **`envelope`** - the `ServiceResult` outcome type and `Task` descriptor
//! - **`token`** - symmetric JWT encode/decode with expiry and audience
//!   classification
//! - **`error`** - the `ServiceError` taxonomy and its HTTP conversion
//! - **`auth`** - authentication middleware, principal adaptation, role gate
//!   support
//! - **`db`** - the shared PostgreSQL resource and its lifecycle policy
//! - **`respond`** - the response builder: envelope rendering, task
//!   scheduling, per-request connection management
//! - **`routing`** - `RouteSpec` descriptors and the view builder
//! - **`app`** - settings, shared state and the `ServiceApp` assembly
//! - **`account`** - SQL-backed signup/login/verification service layer
//! - **`notification`** - email/SMS/phone-verification service layer
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use saxum::account::{account_routes, AccountService, AccountSettings, SqlUserStore};
//! use saxum::app::{AppSettings, ServiceApp};
//! use saxum::db::Database;
//! use saxum::token::TokenCodec;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = AppSettings::from_env();
//! let database = Arc::new(Database::new(
//!     settings.database_url.clone().unwrap_or_default(),
//!     settings.replica_database_url.clone(),
//!     None,
//! ));
//! let service = AccountService::new(
//!     Arc::new(SqlUserStore::new(database.clone())),
//!     TokenCodec::new(&settings.secret_key, &settings.jwt_issuer),
//!     AccountSettings::from(&settings),
//! );
//! let app = ServiceApp::builder(settings)
//!     .database(database)
//!     .verifier(Arc::new(service.clone()))
//!     .routes(account_routes(service))
//!     .build();
//! app.serve("0.0.0.0:8000".parse()?).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Application state is an `Arc`-shared snapshot resolved at startup; the
//! database handle carries its own interior locking. Background tasks are
//! detached from the request that queued them and survive client
//! disconnects.

/// Result envelope and background tasks
pub mod envelope;

/// JWT codec
pub mod token;

/// Error taxonomy and HTTP conversion
pub mod error;

/// Authentication backend
pub mod auth;

/// Shared database resource
pub mod db;

/// Response builder
pub mod respond;

/// Route descriptors and view builder
pub mod routing;

/// Application shell
pub mod app;

/// Account service layer
pub mod account;

/// Notification service layer
pub mod notification;

pub use app::{AppSettings, AppState, ServiceApp};
pub use envelope::{fields, ServiceResult, Task};
pub use error::ServiceError;
pub use respond::{build_response, json_response};
pub use routing::RouteSpec;
pub use token::{TokenClaims, TokenCodec, TokenError};
