/**
 * Service Error Types
 *
 * This module defines the error taxonomy shared by the authentication
 * backend, the response builder and the service layers.
 *
 * # Error Categories
 *
 * - `Authentication` - malformed/expired/invalid bearer token or missing
 *   credentials; surfaced as HTTP 403 with a generic message
 * - `Validation` - missing/invalid request fields; surfaced as HTTP 400
 *   with the field map merged into the envelope
 * - `NotFound` - referenced entity absent; surfaced as HTTP 400 with a
 *   descriptive message (not 404, by envelope convention)
 * - `NotConnected`/`Database`/`Token`/`Serialization` - infrastructure
 *   failures; not recovered by this layer
 */

use axum::http::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::token::TokenError;

/// Errors that cross the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bearer token rejected or credentials missing.
    ///
    /// The message is the application-configured one; internal decode detail
    /// never reaches the client.
    #[error("{message}")]
    Authentication {
        /// Client-visible error message
        message: String,
    },

    /// Request fields missing or invalid.
    #[error("Validation failed")]
    Validation {
        /// Field-level error map, merged into the envelope at top level
        fields: Map<String, Value>,
    },

    /// Referenced entity absent.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    /// The shared database resource has not been connected.
    #[error("Database is not connected")]
    NotConnected,

    /// Database failure.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Token encode failure outside the authentication path.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// JSON serialization failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Authentication failure with a client-visible message.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Validation failure for a single field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(field.into(), Value::String(message.into()));
        Self::Validation { fields }
    }

    /// Missing-entity failure.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    ///
    /// Authentication maps to 403, business errors to 400, infrastructure
    /// failures to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication { .. } => StatusCode::FORBIDDEN,
            Self::Validation { .. } | Self::NotFound { .. } => StatusCode::BAD_REQUEST,
            Self::NotConnected
            | Self::Database(_)
            | Self::Token(_)
            | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is safe to echo to the client.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Validation { .. } | Self::NotFound { .. }
        )
    }
}
