/**
 * Error Conversion
 *
 * `IntoResponse` for [`ServiceError`], so handlers and middleware can
 * return errors directly while keeping the client-visible body on the
 * uniform envelope convention.
 *
 * # Response Format
 *
 * ```json
 * {"status": false, "msg": "..."}
 * ```
 *
 * Validation errors merge their field map at top level instead of a single
 * `msg`. Infrastructure errors are logged server-side and answered with a
 * generic message; their internal text never reaches the client.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use crate::envelope::ServiceResult;
use crate::error::types::ServiceError;

/// Capture an error inside the response envelope.
///
/// Service functions use this at their boundary: business errors keep their
/// message/field map, infrastructure errors are logged and replaced with a
/// generic message.
impl From<ServiceError> for ServiceResult {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation { fields } => ServiceResult::with_errors(fields),
            _ if e.is_client_visible() => ServiceResult::error_msg(e.to_string()),
            _ => {
                tracing::error!(error = %e, "infrastructure error in service function");
                ServiceResult::error_msg("Internal Server Error")
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = Map::new();
        body.insert("status".to_string(), Value::Bool(false));

        match &self {
            ServiceError::Validation { fields } => {
                for (key, value) in fields {
                    body.insert(key.clone(), value.clone());
                }
            }
            _ if self.is_client_visible() => {
                body.insert("msg".to_string(), Value::String(self.to_string()));
            }
            _ => {
                tracing::error!(error = %self, "infrastructure error while handling request");
                body.insert(
                    "msg".to_string(),
                    Value::String("Internal Server Error".to_string()),
                );
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}
