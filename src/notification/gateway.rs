/**
 * Notification Gateway Contract
 *
 * The delivery boundary for email, SMS and phone verification. Concrete
 * gateways (SMTP relays, SMS providers) live outside this crate; each
 * operation reports field-level errors, an optional background delivery
 * task and an optional payload for the response envelope.
 */

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::envelope::Task;
use crate::error::ServiceError;

/// Outcome of a gateway validation step.
///
/// `errors` present means the request was rejected and nothing is sent.
/// Otherwise `task` carries the deferred delivery and `data` whatever the
/// gateway wants echoed in the success envelope.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub errors: Option<Map<String, Value>>,
    pub task: Option<Task>,
    pub data: Option<Map<String, Value>>,
}

impl DispatchOutcome {
    pub fn rejected(errors: Map<String, Value>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    pub fn accepted(task: Task) -> Self {
        Self {
            task: Some(task),
            ..Self::default()
        }
    }

    pub fn accepted_with_data(task: Task, data: Map<String, Value>) -> Self {
        Self {
            task: Some(task),
            data: Some(data),
            ..Self::default()
        }
    }
}

/// Delivery boundary for notifications.
#[async_trait]
pub trait NotificationGateway: Send + Sync + 'static {
    /// Validate an email request and produce its delivery task.
    async fn validate_and_send_email(
        &self,
        to: &str,
        from: Option<&str>,
        context: Option<&Map<String, Value>>,
    ) -> Result<DispatchOutcome, ServiceError>;

    /// Validate an SMS request and produce its delivery task.
    async fn validate_and_send_sms(
        &self,
        to: &str,
        message: &str,
        from: Option<&str>,
    ) -> Result<DispatchOutcome, ServiceError>;

    /// Start phone-number verification by sending a code.
    async fn send_phone_verification_code(
        &self,
        number: &str,
        email: Option<&str>,
    ) -> Result<DispatchOutcome, ServiceError>;

    /// Check a previously sent verification code.
    ///
    /// Returns an error map when the code does not match; `None` means the
    /// number is verified.
    async fn confirm_phone_number(
        &self,
        number: &str,
        code: &str,
    ) -> Result<Option<Map<String, Value>>, ServiceError>;
}
