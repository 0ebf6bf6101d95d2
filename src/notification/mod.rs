//! Notification Service Layer
//!
//! Email, SMS and phone-verification endpoints over a pluggable delivery
//! gateway. The routes validate field presence; delivery itself happens in
//! background tasks produced by the gateway.

/// Delivery contract
pub mod gateway;

/// Route descriptors
pub mod routes;

pub use gateway::{DispatchOutcome, NotificationGateway};
pub use routes::notification_routes;
