/**
 * Application Settings
 *
 * The environment/config surface consumed (not owned) by the core:
 * database URLs, JWT issuer and secret, the serverless flag, CORS policy
 * and the conventional header names and messages. All values are opaque to
 * the core and passed in at construction time.
 *
 * # Configuration Sources
 *
 * `AppSettings::from_env` reads environment variables (after loading a
 * `.env` file when present), with development defaults where a missing
 * value is survivable. A missing secret is logged loudly but does not
 * prevent startup.
 */

/// Alternate header carrying provider-issued bearer tokens.
pub const PROVIDER_AUTH_HEADER: &str = "g-authorization";

/// Alternate header carrying staff-elevated bearer tokens.
pub const STAFF_AUTH_HEADER: &str = "staffauth";

/// Settings consumed by the application shell and the service layers.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Primary database URL; `None` disables the shared database resource.
    pub database_url: Option<String>,
    /// Read-replica URL.
    pub replica_database_url: Option<String>,
    /// `iss` claim stamped into every token.
    pub jwt_issuer: String,
    /// Symmetric signing secret.
    pub secret_key: String,
    /// Per-request database lifecycle instead of connect-at-boot.
    pub serverless: bool,
    /// Attach the permissive CORS layer.
    pub cors: bool,
    /// Client-visible message for rejected bearer tokens.
    pub auth_error_msg: String,
    /// Elevation code accepted at login for staff access tokens.
    pub staff_access_code: Option<String>,
    /// Where successful email verification redirects to.
    pub redirect_url_on_email_verification: String,
    /// Report email-verification failures as JSON instead of an
    /// error-redirect.
    pub redirect_error_as_json: bool,
    /// Lifetime in seconds for short-lived user tokens (email
    /// verification, pre-elevation logins).
    pub user_token_expiry: i64,
}

impl AppSettings {
    /// Settings with development defaults around a secret and issuer.
    pub fn new(secret_key: impl Into<String>, jwt_issuer: impl Into<String>) -> Self {
        Self {
            database_url: None,
            replica_database_url: None,
            jwt_issuer: jwt_issuer.into(),
            secret_key: secret_key.into(),
            serverless: false,
            cors: true,
            auth_error_msg: "Invalid token".to_string(),
            staff_access_code: None,
            redirect_url_on_email_verification: "/".to_string(),
            redirect_error_as_json: false,
            user_token_expiry: 60 * 60,
        }
    }

    /// Load settings from the environment.
    ///
    /// Reads `DATABASE_URL`, `REPLICA_DATABASE_URL`, `JWT_ISSUER`,
    /// `SECRET_KEY`, `SERVERLESS`, `CORS`, `AUTH_ERROR_MSG`,
    /// `STAFF_ACCESS_CODE`, `REDIRECT_URL_ON_EMAIL_VERIFICATION`,
    /// `REDIRECT_ERROR_AS_JSON` and `USER_TOKEN_EXPIRY`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let secret_key = std::env::var("SECRET_KEY").unwrap_or_else(|_| {
            tracing::error!("SECRET_KEY not set; using an insecure development secret");
            "insecure-development-secret".to_string()
        });
        let jwt_issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "saxum".to_string());

        let database_url = std::env::var("DATABASE_URL").ok();
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; database features will be disabled");
        }

        let mut settings = Self::new(secret_key, jwt_issuer);
        settings.database_url = database_url;
        settings.replica_database_url = std::env::var("REPLICA_DATABASE_URL").ok();
        settings.serverless = env_flag("SERVERLESS");
        settings.cors = std::env::var("CORS").map(|v| truthy(&v)).unwrap_or(true);
        if let Ok(msg) = std::env::var("AUTH_ERROR_MSG") {
            settings.auth_error_msg = msg;
        }
        settings.staff_access_code = std::env::var("STAFF_ACCESS_CODE").ok();
        if let Ok(url) = std::env::var("REDIRECT_URL_ON_EMAIL_VERIFICATION") {
            settings.redirect_url_on_email_verification = url;
        }
        settings.redirect_error_as_json = env_flag("REDIRECT_ERROR_AS_JSON");
        if let Ok(expiry) = std::env::var("USER_TOKEN_EXPIRY") {
            match expiry.parse() {
                Ok(seconds) => settings.user_token_expiry = seconds,
                Err(_) => tracing::warn!("USER_TOKEN_EXPIRY is not a number, keeping default"),
            }
        }
        settings
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| truthy(&v)).unwrap_or(false)
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
