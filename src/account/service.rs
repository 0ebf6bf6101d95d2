/**
 * Account Service
 *
 * Signup, login, password reset/recovery, email verification, account
 * deletion and staff impersonation over a pluggable `UserStore`, plus the
 * `TokenVerifier` implementation that backs the authentication middleware.
 *
 * # Token Conventions
 *
 * Two token grades are minted here:
 *
 * - a *user token*: short-lived, no audience; used for email verification
 *   links and password-less logins
 * - an *access token*: non-expiring, audience set to the account's
 *   permission names; the audience claim is what marks full access, and
 *   role elevation at verification time requires it
 *
 * # Provider Flows
 *
 * `signup_info`/`login_info` may name an external provider (google,
 * facebook, admin, staff). Provider assertions are checked through the
 * injected `ProviderVerifier`; a missing verifier skips the check, matching
 * deployments that handle providers elsewhere.
 */

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::app::config::AppSettings;
use crate::auth::backend::TokenVerifier;
use crate::auth::principal::VerifiedPrincipal;
use crate::envelope::{fields, ServiceResult, Task, TaskFn};
use crate::error::ServiceError;
use crate::routing::ServiceRequest;
use crate::token::TokenCodec;

use super::store::{
    CreateUserOutcome, NewUser, ProviderVerifier, UserRecord, UserStore, VerificationSender,
};

/// Account-relevant settings, extracted from [`AppSettings`].
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Elevation code accepted at login for staff access tokens.
    pub staff_access_code: Option<String>,
    /// Where successful email verification redirects to.
    pub redirect_url_on_email_verification: String,
    /// Report verification failures as JSON instead of an error-redirect.
    pub redirect_error_as_json: bool,
    /// Lifetime in seconds for user tokens.
    pub user_token_expiry: i64,
}

impl From<&AppSettings> for AccountSettings {
    fn from(settings: &AppSettings) -> Self {
        Self {
            staff_access_code: settings.staff_access_code.clone(),
            redirect_url_on_email_verification: settings
                .redirect_url_on_email_verification
                .clone(),
            redirect_error_as_json: settings.redirect_error_as_json,
            user_token_expiry: settings.user_token_expiry,
        }
    }
}

/// The account service layer. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    provider: Option<Arc<dyn ProviderVerifier>>,
    sender: Option<Arc<dyn VerificationSender>>,
    codec: TokenCodec,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: TokenCodec,
        settings: AccountSettings,
    ) -> Self {
        Self {
            store,
            provider: None,
            sender: None,
            codec,
            settings,
        }
    }

    /// Install the external-provider verifier.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderVerifier>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Install the verification-email sender.
    pub fn with_sender(mut self, sender: Arc<dyn VerificationSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    /// Short-lived token without an audience claim.
    async fn user_token(&self, user: &UserRecord) -> Result<String, ServiceError> {
        let token = self.codec.encode(
            user.token_payload(),
            Some(self.settings.user_token_expiry),
            None,
        )?;
        Ok(token)
    }

    /// Non-expiring token whose audience is the account's permission names.
    async fn access_token(
        &self,
        user: &UserRecord,
        additional: Option<Map<String, Value>>,
    ) -> Result<String, ServiceError> {
        let mut payload = user.token_payload();
        if let Some(additional) = additional {
            payload.extend(additional);
        }
        let audience = self.store.permission_names(user).await?;
        let token = self.codec.encode(payload, None, Some(audience))?;
        Ok(token)
    }

    /// Re-validate a bearer token against the account it claims.
    ///
    /// Expiry is enforced when the token carries `exp`; the audience is
    /// enforced against the account's permission names when the token
    /// carries `aud`.
    async fn validate_token(&self, user: &UserRecord, token: &str) -> Result<bool, ServiceError> {
        let claims = match self.codec.decode(token, true, None) {
            Ok(claims) => claims,
            Err(_) => return Ok(false),
        };
        if claims.aud.is_some() {
            let audience = self.store.permission_names(user).await?;
            if self.codec.decode(token, true, Some(&audience)).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Wrap the sender as a background-task callable taking the recipient
    /// positionally and `token`/`callback_url` as keyword arguments.
    fn sender_task_fn(&self) -> Option<TaskFn> {
        let sender = self.sender.clone()?;
        let callable: TaskFn = Arc::new(move |args, kwargs| {
            let sender = sender.clone();
            Box::pin(async move {
                let Some(email) = args.first().and_then(Value::as_str).map(str::to_string)
                else {
                    tracing::error!("verification task scheduled without a recipient");
                    return;
                };
                let token = kwargs.get("token").and_then(Value::as_str).map(str::to_string);
                let callback_url = kwargs
                    .get("callback_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                sender
                    .send(&email, token.as_deref(), callback_url.as_deref())
                    .await;
            })
        });
        Some(callable)
    }

    fn verification_task(
        &self,
        email: &str,
        token: Option<&str>,
        callback_url: Option<&str>,
    ) -> Option<Task> {
        let callable = self.sender_task_fn()?;
        let mut kwargs = Map::new();
        if let Some(token) = token {
            kwargs.insert("token".to_string(), Value::String(token.to_string()));
        }
        if let Some(url) = callback_url {
            kwargs.insert("callback_url".to_string(), Value::String(url.to_string()));
        }
        Some(Task::with_kwargs(
            callable,
            vec![Value::String(email.to_string())],
            kwargs,
        ))
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// `POST /signup`
    pub async fn signup(&self, request: ServiceRequest) -> ServiceResult {
        match self.signup_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn signup_inner(&self, request: ServiceRequest) -> Result<ServiceResult, ServiceError> {
        let mut data = request
            .post_data
            .clone()
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        let signup_info = match data.remove("signup_info") {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => return Ok(ServiceResult::error_msg("Not Authorized")),
        };

        let provider = signup_info
            .get("provider")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let bearer_token = request.bearer_from(crate::app::config::PROVIDER_AUTH_HEADER);

        let mut email_verified = false;
        if !provider.is_empty() {
            if bearer_token.is_none() {
                match provider.as_str() {
                    "google" | "facebook" => {
                        return Ok(ServiceResult::error_msg("Missing Authorization header"));
                    }
                    "admin" => return Ok(ServiceResult::error_msg("Not Authorized")),
                    _ => {}
                }
            }
            if provider == "staff" && data.get("department").and_then(Value::as_str).is_none() {
                return Ok(ServiceResult::error_msg("Department for staff missing"));
            }
            if let Some(verifier) = &self.provider {
                if let Err(e) = verifier
                    .verify(&signup_info, bearer_token.as_deref(), &data)
                    .await
                {
                    return Ok(ServiceResult::error_msg(e.message));
                }
            }
            // Facebook assertions do not prove the email address.
            email_verified = provider != "facebook";
        }

        let mut field_errors = Map::new();
        let email = data
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let full_name = data
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if email.is_empty() {
            field_errors.insert("email".to_string(), json!(["Missing data"]));
        }
        if full_name.is_empty() {
            field_errors.insert("full_name".to_string(), json!(["Missing data"]));
        }
        if !field_errors.is_empty() {
            return Ok(ServiceResult::with_errors(fields(
                json!({ "errors": field_errors }),
            )));
        }

        let mut record_info = Map::new();
        record_info.insert("verified".to_string(), Value::Bool(email_verified));
        let mut roles = Vec::new();
        if !provider.is_empty() {
            record_info.insert("provider".to_string(), Value::String(provider.clone()));
            if provider == "admin" || provider == "staff" {
                roles.push(provider.clone());
            }
            if provider == "staff" {
                if let Some(department) = data.get("department") {
                    record_info.insert("department".to_string(), department.clone());
                }
            }
        }

        let new_user = NewUser {
            email,
            full_name,
            password: data
                .get("password")
                .and_then(Value::as_str)
                .map(str::to_string),
            roles,
            signup_info: record_info,
        };

        let user = match self.store.create_user(new_user).await? {
            CreateUserOutcome::Created(user) => user,
            CreateUserOutcome::Rejected(errors) => {
                return Ok(ServiceResult::with_errors(fields(
                    json!({ "errors": errors }),
                )));
            }
        };

        let access_token = self.codec.encode(user.token_payload(), None, None)?;
        let mut result = ServiceResult::with_data(fields(json!({ "access_token": access_token })));

        let wants_email_verification = signup_info
            .get("verification")
            .and_then(Value::as_str)
            .map(|v| v.contains("email"))
            .unwrap_or(false);
        if wants_email_verification {
            let temp_token = self.user_token(&user).await?;
            if let Some(task) = self.verification_task(&user.email, Some(&temp_token), None) {
                result = result.task(task);
            }
        }
        Ok(result)
    }

    /// `POST /login`
    pub async fn login(&self, request: ServiceRequest) -> ServiceResult {
        match self.login_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn login_inner(&self, request: ServiceRequest) -> Result<ServiceResult, ServiceError> {
        let login_info = request
            .post_field("login_info")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        // Provider logins carry their assertion in the alternate provider
        // header; everything else may carry a staff elevation code.
        let header = if login_info.contains_key("provider") {
            crate::app::config::PROVIDER_AUTH_HEADER
        } else {
            crate::app::config::STAFF_AUTH_HEADER
        };
        let bearer_token = request.bearer_from(header);

        let email = request.post_str("email").unwrap_or_default().trim().to_string();
        let number = request.post_str("number").map(str::to_string);
        let password = request.post_str("password").map(str::to_string);
        let callback_url = request.post_str("callback_url").map(str::to_string);
        let endpoint = login_info
            .get("endpoint")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut provider = login_info
            .get("provider")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if email.is_empty() && number.is_none() {
            return Ok(ServiceResult::error_msg("Missing email or phone number"));
        }

        if !provider.is_empty() {
            if matches!(provider.as_str(), "google" | "facebook") && bearer_token.is_none() {
                return Ok(ServiceResult::error_msg("Missing Authorization header"));
            }
            if let Some(verifier) = &self.provider {
                let mut info = Map::new();
                info.insert("provider".to_string(), Value::String(provider.clone()));
                for key in ["client_id", "verify"] {
                    if let Some(value) = login_info.get(key) {
                        info.insert(key.to_string(), value.clone());
                    }
                }
                let payload = fields(json!({ "email": email }));
                if verifier
                    .verify(&info, bearer_token.as_deref(), &payload)
                    .await
                    .is_err()
                {
                    return Ok(ServiceResult::error_msg("Verification failed"));
                }
            }
        }

        if number.is_some() && endpoint.is_none() {
            return Ok(ServiceResult::error_msg(
                "Missing verification endpoint for number",
            ));
        }
        if callback_url.is_some() {
            // Password-less login: mint a user token and email it.
            provider = "token".to_string();
        }

        let token = self
            .resolve_credentials(
                &email,
                number.as_deref(),
                endpoint.as_deref(),
                password.as_deref(),
                bearer_token.as_deref(),
                &provider,
            )
            .await?;
        let Some(token) = token else {
            return Ok(ServiceResult::error_msg("Invalid credentials"));
        };

        if let Some(callback_url) = callback_url {
            if let Some(task) =
                self.verification_task(&email, Some(&token), Some(&callback_url))
            {
                return Ok(ServiceResult::with_data(fields(
                    json!({"msg": "Email verification sent"}),
                ))
                .task(task));
            }
        }
        Ok(ServiceResult::with_data(fields(
            json!({ "access_token": token }),
        )))
    }

    /// Credential check yielding the token grade the login qualifies for.
    async fn resolve_credentials(
        &self,
        email: &str,
        number: Option<&str>,
        endpoint: Option<&str>,
        password: Option<&str>,
        bearer_token: Option<&str>,
        provider: &str,
    ) -> Result<Option<String>, ServiceError> {
        let email = if email.is_empty() {
            let Some(number) = number else {
                return Ok(None);
            };
            match self.store.email_for_number(number, endpoint).await? {
                Some(email) => email,
                None => return Ok(None),
            }
        } else {
            email.to_string()
        };

        let Some(user) = self.store.get_user(&email).await? else {
            return Ok(None);
        };

        let mut token = None;
        if let Some(password) = password {
            if self.store.check_password(&email, password).await? {
                token = Some(self.user_token(&user).await?);
                let elevated = matches!(
                    (&self.settings.staff_access_code, bearer_token),
                    (Some(code), Some(bearer)) if code == bearer
                );
                if elevated {
                    token = Some(self.access_token(&user, None).await?);
                }
            }
        }
        if !provider.is_empty() {
            token = Some(if provider == "token" {
                self.user_token(&user).await?
            } else {
                self.access_token(&user, None).await?
            });
        }
        Ok(token)
    }

    /// `POST /reset-password` (auth: authenticated)
    pub async fn reset_password(&self, request: ServiceRequest) -> ServiceResult {
        match self.reset_password_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn reset_password_inner(
        &self,
        request: ServiceRequest,
    ) -> Result<ServiceResult, ServiceError> {
        let Some(user) = &request.user else {
            return Ok(ServiceResult::error_msg("Not Authorized"));
        };
        let Some(email) = user.identity_str("email").map(str::to_string) else {
            return Ok(ServiceResult::error_msg("Not Authorized"));
        };
        let Some(record) = self.store.get_user(&email).await? else {
            return Ok(ServiceResult::error_msg("Missing user record"));
        };

        let bearer = request.bearer_from("authorization").unwrap_or_default();
        if !self.validate_token(&record, &bearer).await? {
            return Ok(ServiceResult::error_msg("Token is invalid or expired"));
        }

        let Some(password) = request.post_str("password").map(str::to_string) else {
            return Ok(ServiceResult::error_msg("Missing password"));
        };

        let store = self.store.clone();
        let task = Task::call(move || {
            let store = store.clone();
            let email = email.clone();
            let password = password.clone();
            async move {
                if let Err(e) = store.set_password(&email, &password).await {
                    tracing::error!(error = %e, "failed to persist new password");
                }
            }
        });
        Ok(ServiceResult::ok().task(task))
    }

    /// `GET /forgot-password`
    pub async fn forgot_password(&self, request: ServiceRequest) -> ServiceResult {
        let (Some(email), Some(callback_url)) =
            (request.query("email"), request.query("callback_url"))
        else {
            return ServiceResult::error_msg("Both email and callback url is expected");
        };
        let mut result = ServiceResult::ok();
        if let Some(task) = self.verification_task(email, None, Some(callback_url)) {
            result = result.task(task);
        }
        result
    }

    /// `GET /verify-email` (redirect route)
    pub async fn verify_email(&self, request: ServiceRequest) -> ServiceResult {
        match self.verify_email_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn verify_email_inner(
        &self,
        request: ServiceRequest,
    ) -> Result<ServiceResult, ServiceError> {
        let (Some(email), Some(token)) = (request.query("email"), request.query("token")) else {
            return Ok(ServiceResult::error_msg("Missing query parameters"));
        };
        let callback_url = request.query("callback_url");

        let mut redirect_url = None;
        if let Some(user) = self.store.get_user(email.trim()).await? {
            if self.validate_token(&user, token).await? {
                redirect_url = Some(match callback_url {
                    Some(callback_url) => {
                        let access_token = self.access_token(&user, None).await?;
                        format!("{callback_url}?access_token={access_token}")
                    }
                    None => {
                        self.store.verify_user(&user.email).await?;
                        self.settings.redirect_url_on_email_verification.clone()
                    }
                });
            }
        }

        let Some(redirect_url) = redirect_url.or_else(|| {
            if self.settings.redirect_error_as_json {
                None
            } else {
                Some(format!(
                    "{}?error_msg=Invalid user or token",
                    self.settings.redirect_url_on_email_verification
                ))
            }
        }) else {
            return Ok(ServiceResult::error_msg("Invalid user or token"));
        };
        Ok(ServiceResult::with_data(fields(
            json!({ "redirect_url": redirect_url }),
        )))
    }

    /// `POST /delete-user`
    pub async fn delete_user(&self, request: ServiceRequest) -> ServiceResult {
        match self.delete_user_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn delete_user_inner(
        &self,
        request: ServiceRequest,
    ) -> Result<ServiceResult, ServiceError> {
        let email = request.post_str("email").unwrap_or_default();
        if self.store.get_user(email).await?.is_none() {
            return Ok(ServiceResult::error_msg("Missing user record"));
        }
        self.store.delete_user(email).await?;
        Ok(ServiceResult::with_data(fields(json!({"msg": "Done"}))))
    }

    /// `GET /hijack-user` (auth: staff)
    pub async fn hijack_user(&self, request: ServiceRequest) -> ServiceResult {
        match self.hijack_user_inner(request).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn hijack_user_inner(
        &self,
        request: ServiceRequest,
    ) -> Result<ServiceResult, ServiceError> {
        let Some(staff) = &request.user else {
            return Ok(ServiceResult::error_msg("Not Authorized"));
        };
        let Some(staff_email) = staff.identity_str("email").map(str::to_string) else {
            return Ok(ServiceResult::error_msg("Not Authorized"));
        };
        let Some(staff_record) = self.store.get_user(&staff_email).await? else {
            return Ok(ServiceResult::error_msg("Missing user record"));
        };

        let bearer = request.bearer_from("authorization").unwrap_or_default();
        if !self.validate_token(&staff_record, &bearer).await? {
            return Ok(ServiceResult::error_msg("Token is invalid or expired"));
        }

        let Some(email) = request.query("email") else {
            return Ok(ServiceResult::error_msg("Missing email"));
        };
        let Some(target) = self.store.get_user(email).await? else {
            return Ok(ServiceResult::error_msg("No user with email"));
        };

        let additional = fields(json!({ "hijacker": staff_email }));
        let access_token = self.access_token(&target, Some(additional)).await?;
        Ok(ServiceResult::with_data(fields(
            json!({ "access_token": access_token }),
        )))
    }
}

/// Backs the authentication middleware: decode the bearer token (expiry is
/// not enforced at this gate), resolve the account and derive the role set.
/// Staff/admin elevation requires both the account state and an audience
/// claim on the token.
#[async_trait]
impl TokenVerifier for AccountService {
    async fn verify_access_token(
        &self,
        bearer_token: &str,
    ) -> Result<VerifiedPrincipal, ServiceError> {
        let claims = self
            .codec
            .decode(bearer_token, false, None)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token failed to decode");
                ServiceError::authentication("Invalid token")
            })?;
        let Some(email) = claims.payload_str("email") else {
            return Err(ServiceError::authentication("Invalid token"));
        };
        let Some(user) = self.store.get_user(email).await? else {
            return Err(ServiceError::authentication("Invalid token"));
        };

        let mut roles = vec!["authenticated".to_string()];
        let full_access = claims.aud.is_some();
        if user.is_staff() && full_access {
            roles.push("staff".to_string());
        }
        if user.is_superuser() && full_access {
            roles.push("admin".to_string());
        }
        let principal = json!({
            "email": user.email,
            "full_name": user.full_name,
            "roles": user.roles,
            "signup_info": user.signup_info,
        });
        Ok(VerifiedPrincipal::new(principal, roles))
    }
}
