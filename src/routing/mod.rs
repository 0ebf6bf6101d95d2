//! Routing Module
//!
//! Turns service-layer functions into routable endpoints.
//!
//! # Architecture
//!
//! - **`route_spec`** - static route descriptors and the service-function
//!   calling convention
//! - **`view`** - registration of a descriptor onto an axum router: body
//!   and parameter extraction, the role gate, and the hand-off to the
//!   response builder
//!
//! Route descriptors are built once at application boot and iterated to
//! register with the HTTP layer; nothing about a route is re-derived per
//! request.

/// Route descriptors
pub mod route_spec;

/// Endpoint construction
pub mod view;

pub use route_spec::{Endpoint, RawHandler, RouteSpec, ServiceHandler, ServiceRequest};
pub use view::{build_view, MAX_BODY_BYTES};
