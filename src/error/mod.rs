//! Error Module
//!
//! Error taxonomy for the service layer and its HTTP conversion.
//!
//! # Architecture
//!
//! - **`types`** - error type definitions and status mapping
//! - **`conversion`** - `IntoResponse` implementation (uniform envelope body)
//!
//! # Propagation policy
//!
//! Business failures (validation, not-found) are normally captured inside a
//! [`ServiceResult`](crate::envelope::ServiceResult) and never raised past
//! the service boundary. Only authentication and infrastructure failures
//! travel as `ServiceError` values; the `IntoResponse` conversion keeps the
//! client-visible body on the `{"status": false, ...}` convention and never
//! leaks internal error text for infrastructure failures.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::ServiceError;
