/**
 * Token Codec
 *
 * Symmetric JWT encode/decode for application access tokens.
 *
 * Every token carries `iss`, `sub` (the fixed literal "access") and `iat`.
 * `exp` is stamped only when an expiry is supplied; a token without `exp`
 * never expires, and an expiry-checked decode of such a token passes
 * fail-soft (there is no expiry to validate). `aud` is stamped only when a
 * non-empty audience list (permission names) is supplied; decoding with audience
 * validation enabled rejects tokens minted without any `aud` claim, which is
 * the deliberate "downgrade" signal for restricted verification contexts.
 *
 * Decode failures are classified so call sites can branch on them: an
 * expired token reads differently to the user than a tampered one.
 */

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fixed `sub` literal identifying the purpose of tokens minted here.
pub const ACCESS_TOKEN_SUBJECT: &str = "access";

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Registered and custom claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer, from application settings.
    pub iss: String,
    /// Token purpose, always [`ACCESS_TOKEN_SUBJECT`] for tokens minted here.
    pub sub: String,
    /// Issued-at, seconds since epoch (UTC).
    pub iat: i64,
    /// Expiry, seconds since epoch. Absent means the token never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Audience: the permission names this token is scoped to. Absence marks
    /// an unrestricted token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
    /// Application payload (email, hijacker, ...), flattened into the claim
    /// set.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TokenClaims {
    /// Fetch a string field from the custom payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Decode failure classification.
///
/// `Expired` and `Audience` are distinguished from the catch-all `Invalid`
/// because callers surface different messages for them.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's `exp` lies in the past.
    #[error("Token is expired")]
    Expired,
    /// Audience validation was requested and the token's `aud` claim is
    /// missing or does not intersect the expected audience.
    #[error("Token audience mismatch")]
    Audience,
    /// Signature or format failure, or any other decode error.
    #[error("Invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Secret-keyed JWT encoder/decoder (HS256).
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    issuer: String,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    /// Issuer stamped into every token.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Encode a token.
    ///
    /// # Arguments
    /// * `payload` - custom claims merged into the token body
    /// * `expires_in` - lifetime in seconds; `None` mints a non-expiring token
    /// * `audience` - permission names to scope the token to, if any. An
    ///   empty list is the same as no audience: the claim is omitted, so the
    ///   token stays unrestricted instead of matching nothing.
    pub fn encode(
        &self,
        payload: Map<String, Value>,
        expires_in: Option<i64>,
        audience: Option<Vec<String>>,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: ACCESS_TOKEN_SUBJECT.to_string(),
            iat: now,
            exp: expires_in.map(|delta| now + delta),
            aud: audience.filter(|names| !names.is_empty()),
            payload,
        };
        let key = EncodingKey::from_secret(self.secret.as_ref());
        encode(&Header::new(ALGORITHM), &claims, &key).map_err(TokenError::Invalid)
    }

    /// Decode and validate a token.
    ///
    /// The signature is always verified. Expiry is enforced only when
    /// `verify_expiry` is set, and only if the token carries `exp`. Audience
    /// is enforced only when an expected audience is supplied; a token
    /// without `aud` then fails with [`TokenError::Audience`].
    pub fn decode(
        &self,
        token: &str,
        verify_expiry: bool,
        audience: Option<&[String]>,
    ) -> Result<TokenClaims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.as_ref());
        let mut validation = Validation::new(ALGORITHM);
        // exp is optional by design; required claims are checked manually.
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = verify_expiry;
        match audience {
            Some(expected) => validation.set_audience(expected),
            None => validation.validate_aud = false,
        }

        let data =
            decode::<TokenClaims>(token, &key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidAudience => TokenError::Audience,
                ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => TokenError::Audience,
                _ => TokenError::Invalid(e),
            })?;

        // A token minted with a broader audience must not pass a narrower
        // verification context that the library skipped because the claim
        // was absent.
        if audience.is_some() && data.claims.aud.is_none() {
            return Err(TokenError::Audience);
        }
        Ok(data.claims)
    }
}
