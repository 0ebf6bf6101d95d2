//! Shared Database Resource
//!
//! The process-wide database handle and its lifecycle policy. In a
//! long-running deployment the pool is opened once at startup and closed
//! once at shutdown; in serverless deployments it is opened before each
//! request and torn down by a background task after the response is sent.

/// Database handle and lifecycle policy
pub mod database;

pub use database::{ConnectionLifecycle, Database, ModelInitializer};
