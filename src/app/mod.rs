//! Application Shell
//!
//! Composes the authentication backend, CORS, the generated routes and the
//! database lifecycle hooks into a deployable axum application.
//!
//! # Architecture
//!
//! - **`config`** - environment-derived settings surface
//! - **`state`** - shared application state and `FromRef` extraction
//! - **`shell`** - the `ServiceApp` builder: route registration,
//!   middleware layering, startup/shutdown hooks

/// Settings loading
pub mod config;

/// Application state
pub mod state;

/// Application assembly
pub mod shell;

pub use config::AppSettings;
pub use shell::{init_tracing, ServiceApp, ServiceAppBuilder};
pub use state::AppState;
