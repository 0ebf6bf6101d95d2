/**
 * Notification Routes
 *
 * The HTTP surface over a `NotificationGateway`: field presence is checked
 * here, delivery is deferred to gateway-produced background tasks.
 */

use std::sync::Arc;

use axum::http::Method;
use serde_json::{json, Value};

use crate::envelope::{fields, ServiceResult};
use crate::routing::{RouteSpec, ServiceRequest};

use super::gateway::{DispatchOutcome, NotificationGateway};

/// Route descriptors for the notification endpoints.
pub fn notification_routes(gateway: Arc<dyn NotificationGateway>) -> Vec<RouteSpec> {
    let email = gateway.clone();
    let sms = gateway.clone();
    let send_code = gateway.clone();
    let confirm = gateway;

    vec![
        RouteSpec::service("/send-email", vec![Method::POST], move |request| {
            let gateway = email.clone();
            async move { send_email(gateway, request).await }
        }),
        RouteSpec::service("/send-sms", vec![Method::POST], move |request| {
            let gateway = sms.clone();
            async move { send_sms(gateway, request).await }
        }),
        RouteSpec::service(
            "/phone/send-verification",
            vec![Method::POST],
            move |request| {
                let gateway = send_code.clone();
                async move { send_phone_verification(gateway, request).await }
            },
        ),
        RouteSpec::service("/phone/confirm", vec![Method::POST], move |request| {
            let gateway = confirm.clone();
            async move { confirm_phone_number(gateway, request).await }
        }),
    ]
}

fn from_outcome(outcome: DispatchOutcome) -> ServiceResult {
    if let Some(errors) = outcome.errors {
        return ServiceResult::with_errors(errors);
    }
    let mut result = match outcome.data {
        Some(data) => ServiceResult::with_data(data),
        None => ServiceResult::ok(),
    };
    if let Some(task) = outcome.task {
        result = result.task(task);
    }
    result
}

async fn send_email(gateway: Arc<dyn NotificationGateway>, request: ServiceRequest) -> ServiceResult {
    let Some(to) = request.post_str("to") else {
        return ServiceResult::error_msg("Missing recipient");
    };
    let from = request.post_str("from");
    let context = request.post_field("context").and_then(Value::as_object);
    match gateway.validate_and_send_email(to, from, context).await {
        Ok(outcome) => from_outcome(outcome),
        Err(e) => e.into(),
    }
}

async fn send_sms(gateway: Arc<dyn NotificationGateway>, request: ServiceRequest) -> ServiceResult {
    let (Some(to), Some(message)) = (request.post_str("to"), request.post_str("msg")) else {
        return ServiceResult::error_msg("Missing recipient `to` or message `msg`");
    };
    let from = request.post_str("from");
    match gateway.validate_and_send_sms(to, message, from).await {
        Ok(outcome) => from_outcome(outcome),
        Err(e) => e.into(),
    }
}

async fn send_phone_verification(
    gateway: Arc<dyn NotificationGateway>,
    request: ServiceRequest,
) -> ServiceResult {
    let Some(number) = request.post_str("number") else {
        return ServiceResult::error_msg("Missing phone number");
    };
    let email = request.post_str("email");
    match gateway.send_phone_verification_code(number, email).await {
        Ok(outcome) => from_outcome(outcome),
        Err(e) => e.into(),
    }
}

async fn confirm_phone_number(
    gateway: Arc<dyn NotificationGateway>,
    request: ServiceRequest,
) -> ServiceResult {
    let (Some(number), Some(code)) = (request.post_str("number"), request.post_str("code")) else {
        return ServiceResult::error_msg("Missing phone number or verification code");
    };
    match gateway.confirm_phone_number(number, code).await {
        Ok(Some(errors)) => ServiceResult::with_errors(errors),
        Ok(None) => ServiceResult::with_data(fields(json!({"msg": "Phone number verified"}))),
        Err(e) => e.into(),
    }
}
