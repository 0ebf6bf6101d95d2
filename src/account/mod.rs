//! Account Service Layer
//!
//! Signup, login, password management, email verification and staff
//! impersonation over a pluggable user store.
//!
//! # Architecture
//!
//! - **`store`** - storage and collaborator contracts (`UserStore`,
//!   `ProviderVerifier`, `VerificationSender`)
//! - **`service`** - the operations and the `TokenVerifier` implementation
//! - **`routes`** - route descriptors for the HTTP surface
//! - **`sql`** - PostgreSQL `UserStore` implementation

/// Storage contracts
pub mod store;

/// Account operations
pub mod service;

/// Route descriptors
pub mod routes;

/// PostgreSQL store
pub mod sql;

pub use routes::account_routes;
pub use service::{AccountService, AccountSettings};
pub use sql::SqlUserStore;
pub use store::{
    CreateUserOutcome, NewUser, ProviderError, ProviderVerifier, UserRecord, UserStore,
    VerificationSender,
};
