/**
 * Account Storage Contracts
 *
 * The user record shape and the collaborator traits the account service
 * is parameterized over: the user store, the external-provider verifier
 * and the verification-email sender. Implementations are resolved once at
 * application startup.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ServiceError;

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    /// Role names ("staff", "admin", ...); matched case-insensitively.
    pub roles: Vec<String>,
    /// Free-form signup metadata: verification state, provider, department.
    pub signup_info: Map<String, Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl UserRecord {
    /// Whether this account carries the admin role.
    pub fn is_superuser(&self) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case("admin"))
    }

    /// Admins are implicitly staff.
    pub fn is_staff(&self) -> bool {
        self.is_superuser() || self.roles.iter().any(|r| r.eq_ignore_ascii_case("staff"))
    }

    /// Whether the account completed email/identity verification.
    pub fn verified(&self) -> bool {
        self.signup_info
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Claims stamped into tokens minted for this account.
    pub fn token_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("email".to_string(), Value::String(self.email.clone()));
        payload.insert(
            "full_name".to_string(),
            Value::String(self.full_name.clone()),
        );
        payload.insert(
            "signup_info".to_string(),
            Value::Object(self.signup_info.clone()),
        );
        payload
    }
}

/// Input to [`UserStore::create_user`]. The password arrives in plaintext;
/// hashing is the store's responsibility.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password: Option<String>,
    pub roles: Vec<String>,
    pub signup_info: Map<String, Value>,
}

/// Outcome of a user-creation attempt.
///
/// Business-level rejections (duplicate email, failed field validation)
/// come back as an error map rather than a `ServiceError`, since they
/// belong inside the response envelope.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    Rejected(Map<String, Value>),
}

/// Persistence boundary for user accounts.
///
/// `set_password` receives plaintext and hashes it internally; plaintext is
/// never stored.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, ServiceError>;

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome, ServiceError>;

    /// Returns whether a record was actually removed.
    async fn delete_user(&self, email: &str) -> Result<bool, ServiceError>;

    async fn set_password(&self, email: &str, plaintext: &str) -> Result<(), ServiceError>;

    async fn check_password(&self, email: &str, plaintext: &str) -> Result<bool, ServiceError>;

    /// Mark the account's email as verified.
    async fn verify_user(&self, email: &str) -> Result<(), ServiceError>;

    /// Permission names used as the audience of full-access tokens.
    ///
    /// The default derives them from the role list; stores with a separate
    /// permission table override this.
    async fn permission_names(&self, user: &UserRecord) -> Result<Vec<String>, ServiceError> {
        Ok(user.roles.clone())
    }

    /// Resolve a phone number to the account email, for deployments doing
    /// phone-based login. The default knows no numbers.
    async fn email_for_number(
        &self,
        _number: &str,
        _endpoint: Option<&str>,
    ) -> Result<Option<String>, ServiceError> {
        Ok(None)
    }
}

/// Rejection from an external identity provider.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Verifies third-party signup/login assertions (Google, Facebook, staff,
/// admin). `Err` means verification failed and the message is surfaced in
/// the error envelope.
#[async_trait]
pub trait ProviderVerifier: Send + Sync + 'static {
    async fn verify(
        &self,
        signup_info: &Map<String, Value>,
        bearer_token: Option<&str>,
        payload: &Map<String, Value>,
    ) -> Result<(), ProviderError>;
}

/// Dispatches verification/reset emails. Invoked from background tasks, so
/// failures are logged by the implementation rather than reported to the
/// client.
#[async_trait]
pub trait VerificationSender: Send + Sync + 'static {
    async fn send(&self, email: &str, token: Option<&str>, callback_url: Option<&str>);
}
