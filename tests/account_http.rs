//! Account service integration tests
//!
//! Full-stack scenarios over the account routes with in-memory
//! collaborators: signup, login, password reset/recovery, email
//! verification, deletion and impersonation.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use common::{account_app, send_json, test_account_service, test_codec, wait_for};

fn token_for(email: &str, audience: Option<Vec<String>>) -> String {
    let mut payload = Map::new();
    payload.insert("email".to_string(), Value::String(email.to_string()));
    test_codec().encode(payload, None, audience).unwrap()
}

#[tokio::test]
async fn test_signup_without_signup_info_is_not_authorized() {
    let (service, _, _) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/signup",
        Some(json!({"email": "shola@example.com", "full_name": "Shola O"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": false, "msg": "Not Authorized"}));
}

#[tokio::test]
async fn test_signup_returns_access_token_and_sends_verification_email() {
    let (service, _, sender) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/signup",
        Some(json!({
            "email": "shola@example.com",
            "full_name": "Shola O",
            "password": "hunter2",
            "signup_info": {"verification": "email"}
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!(true));
    let token = body["data"]["access_token"].as_str().unwrap();
    let claims = test_codec().decode(token, true, None).unwrap();
    assert_eq!(claims.payload_str("email"), Some("shola@example.com"));

    let probe = sender.clone();
    wait_for(move || !probe.sent().is_empty()).await;
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "shola@example.com");
    assert!(sent[0].1.is_some(), "verification email carries a token");
}

#[tokio::test]
async fn test_signup_duplicate_email_is_rejected() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/signup",
        Some(json!({
            "email": "shola@example.com",
            "full_name": "Shola O",
            "signup_info": {"plain": true}
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": false, "errors": {"email": ["value_error.duplicate"]}})
    );
}

#[tokio::test]
async fn test_staff_signup_requires_department() {
    let (service, _, _) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/signup",
        Some(json!({
            "email": "staff@example.com",
            "full_name": "Staff O",
            "signup_info": {"provider": "staff"}
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": false, "msg": "Department for staff missing"})
    );
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/login",
        Some(json!({"email": "shola@example.com", "password": "wrong"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": false, "msg": "Invalid credentials"}));
}

#[tokio::test]
async fn test_login_without_identifier_fails() {
    let (service, _, _) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/login",
        Some(json!({"password": "hunter2"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": false, "msg": "Missing email or phone number"})
    );
}

#[tokio::test]
async fn test_login_with_valid_credentials_mints_token() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/login",
        Some(json!({"email": "shola@example.com", "password": "hunter2"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap();
    let claims = test_codec().decode(token, true, None).unwrap();
    assert_eq!(claims.payload_str("email"), Some("shola@example.com"));
    assert!(claims.aud.is_none(), "password login grants a user token");
}

#[tokio::test]
async fn test_login_with_callback_url_emails_the_token() {
    let (service, store, sender) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/login",
        Some(json!({
            "email": "shola@example.com",
            "callback_url": "https://app.example.com/welcome"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": true, "data": {"msg": "Email verification sent"}})
    );

    let probe = sender.clone();
    wait_for(move || !probe.sent().is_empty()).await;
    let sent = sender.sent();
    assert_eq!(sent[0].0, "shola@example.com");
    assert!(sent[0].1.is_some());
    assert_eq!(sent[0].2.as_deref(), Some("https://app.example.com/welcome"));
}

#[tokio::test]
async fn test_forgot_password_requires_both_params() {
    let (service, _, _) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::GET,
        "/forgot-password?email=shola@example.com",
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": false, "msg": "Both email and callback url is expected"})
    );
}

#[tokio::test]
async fn test_forgot_password_queues_reset_email() {
    let (service, _, sender) = test_account_service();
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::GET,
        "/forgot-password?email=shola@example.com&callback_url=https://app.example.com/reset",
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": true}));

    let probe = sender.clone();
    wait_for(move || !probe.sent().is_empty()).await;
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "shola@example.com");
    assert!(sent[0].1.is_none(), "recovery email carries no token");
    assert_eq!(sent[0].2.as_deref(), Some("https://app.example.com/reset"));
}

#[tokio::test]
async fn test_reset_password_persists_plaintext_through_the_store_once() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let token = token_for("shola@example.com", None);
    let (status, body) = send_json(
        &router,
        Method::POST,
        "/reset-password",
        Some(json!({"password": "new-password"})),
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": true}));

    let probe = store.clone();
    wait_for(move || !probe.password_writes().is_empty()).await;
    let writes = store.password_writes();
    assert_eq!(
        writes,
        vec![("shola@example.com".to_string(), "new-password".to_string())]
    );
}

#[tokio::test]
async fn test_reset_password_requires_password_field() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let token = token_for("shola@example.com", None);
    let (status, body) = send_json(
        &router,
        Method::POST,
        "/reset-password",
        Some(json!({})),
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": false, "msg": "Missing password"}));
    assert!(store.password_writes().is_empty());
}

#[tokio::test]
async fn test_verify_email_redirects_and_marks_verified() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let token = token_for("shola@example.com", None);
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!(
            "/verify-email?email=shola@example.com&token={token}"
        ))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/",
        "redirects to the configured verification target"
    );

    let probe = store.clone();
    wait_for(move || {
        probe
            .user("shola@example.com")
            .is_some_and(|u| u.verified())
    })
    .await;
}

#[tokio::test]
async fn test_verify_email_with_bad_token_redirects_with_error() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/verify-email?email=shola@example.com&token=garbage")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/?error_msg=Invalid user or token"
    );
}

#[tokio::test]
async fn test_delete_user() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/delete-user",
        Some(json!({"email": "ghost@example.com"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": false, "msg": "Missing user record"}));

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/delete-user",
        Some(json!({"email": "shola@example.com"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": true, "data": {"msg": "Done"}}));
    assert!(store.user("shola@example.com").is_none());
}

#[tokio::test]
async fn test_hijack_user_mints_token_with_hijacker_claim() {
    let (service, store, _) = test_account_service();
    store.seed("staff@example.com", "Staff O", "hunter2", vec!["staff"]);
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let staff_token = token_for("staff@example.com", Some(vec!["staff".to_string()]));
    let (status, body) = send_json(
        &router,
        Method::GET,
        "/hijack-user?email=shola@example.com",
        None,
        &[("authorization", &format!("Bearer {staff_token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap();
    let claims = test_codec().decode(token, true, None).unwrap();
    assert_eq!(claims.payload_str("email"), Some("shola@example.com"));
    assert_eq!(claims.payload_str("hijacker"), Some("staff@example.com"));
}

#[tokio::test]
async fn test_hijacked_token_for_roleless_account_is_usable() {
    // The target has no permission names, so the minted token must carry no
    // audience claim at all and still pass later token validation.
    let (service, store, _) = test_account_service();
    store.seed("staff@example.com", "Staff O", "hunter2", vec!["staff"]);
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let staff_token = token_for("staff@example.com", Some(vec!["staff".to_string()]));
    let (status, body) = send_json(
        &router,
        Method::GET,
        "/hijack-user?email=shola@example.com",
        None,
        &[("authorization", &format!("Bearer {staff_token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();
    let claims = test_codec().decode(&token, true, None).unwrap();
    assert!(claims.aud.is_none());

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/reset-password",
        Some(json!({"password": "hijacked-password"})),
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": true}));
}

#[tokio::test]
async fn test_hijack_user_requires_staff_scope() {
    let (service, store, _) = test_account_service();
    store.seed("shola@example.com", "Shola O", "hunter2", vec![]);
    let router = account_app(service);

    let token = token_for("shola@example.com", None);
    let (status, body) = send_json(
        &router,
        Method::GET,
        "/hijack-user?email=other@example.com",
        None,
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"status": false, "msg": "Not Authorized"}));
}
