//! Common test utilities and helpers
//!
//! In-memory collaborator implementations (user store, verification
//! sender), application builders and request helpers shared by the
//! integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use tower::ServiceExt;
use uuid::Uuid;

use saxum::account::{
    AccountService, AccountSettings, CreateUserOutcome, NewUser, UserRecord, UserStore,
    VerificationSender,
};
use saxum::app::{AppSettings, ServiceApp};
use saxum::envelope::{TaskFn, TaskFuture};
use saxum::error::ServiceError;
use saxum::token::TokenCodec;
use async_trait::async_trait;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_ISSUER: &str = "tests.example.com";

/// In-memory `UserStore` that records password writes.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    passwords: Mutex<HashMap<String, String>>,
    /// Every `(email, plaintext)` pair handed to `set_password`.
    pub password_writes: Mutex<Vec<(String, String)>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly, bypassing the signup flow.
    pub fn seed(&self, email: &str, full_name: &str, password: &str, roles: Vec<&str>) {
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            is_active: true,
            roles: roles.into_iter().map(str::to_string).collect(),
            signup_info: Map::new(),
            created: Utc::now(),
            modified: Utc::now(),
        };
        self.users.lock().unwrap().insert(email.to_string(), record);
        self.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
    }

    pub fn password_writes(&self) -> Vec<(String, String)> {
        self.password_writes.lock().unwrap().clone()
    }

    /// Synchronous record lookup for assertions.
    pub fn user(&self, email: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(email).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome, ServiceError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            let mut errors = Map::new();
            errors.insert("email".to_string(), serde_json::json!(["value_error.duplicate"]));
            return Ok(CreateUserOutcome::Rejected(errors));
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            full_name: user.full_name,
            is_active: true,
            roles: user.roles,
            signup_info: user.signup_info,
            created: Utc::now(),
            modified: Utc::now(),
        };
        users.insert(user.email.clone(), record.clone());
        if let Some(password) = user.password {
            self.passwords.lock().unwrap().insert(user.email, password);
        }
        Ok(CreateUserOutcome::Created(record))
    }

    async fn delete_user(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self.users.lock().unwrap().remove(email).is_some())
    }

    async fn set_password(&self, email: &str, plaintext: &str) -> Result<(), ServiceError> {
        self.password_writes
            .lock()
            .unwrap()
            .push((email.to_string(), plaintext.to_string()));
        self.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), plaintext.to_string());
        Ok(())
    }

    async fn check_password(&self, email: &str, plaintext: &str) -> Result<bool, ServiceError> {
        Ok(self
            .passwords
            .lock()
            .unwrap()
            .get(email)
            .is_some_and(|stored| stored == plaintext))
    }

    async fn verify_user(&self, email: &str) -> Result<(), ServiceError> {
        if let Some(record) = self.users.lock().unwrap().get_mut(email) {
            record
                .signup_info
                .insert("verified".to_string(), Value::Bool(true));
        }
        Ok(())
    }
}

/// `VerificationSender` recording every dispatch.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, Option<String>, Option<String>)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationSender for RecordingSender {
    async fn send(&self, email: &str, token: Option<&str>, callback_url: Option<&str>) {
        self.sent.lock().unwrap().push((
            email.to_string(),
            token.map(str::to_string),
            callback_url.map(str::to_string),
        ));
    }
}

/// A task callable recording each invocation's arguments.
pub fn recording_task_fn(
    log: Arc<Mutex<Vec<(Vec<Value>, Map<String, Value>)>>>,
) -> TaskFn {
    Arc::new(move |args, kwargs| {
        let log = log.clone();
        Box::pin(async move {
            log.lock().unwrap().push((args, kwargs));
        }) as TaskFuture
    })
}

/// Settings used by the integration suites: no database, no CORS noise.
pub fn test_settings() -> AppSettings {
    let mut settings = AppSettings::new(TEST_SECRET, TEST_ISSUER);
    settings.cors = false;
    settings
}

pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_SECRET, TEST_ISSUER)
}

/// Account service over a fresh in-memory store and recording sender.
pub fn test_account_service() -> (AccountService, Arc<MemoryUserStore>, Arc<RecordingSender>) {
    let store = Arc::new(MemoryUserStore::new());
    let sender = Arc::new(RecordingSender::new());
    let service = AccountService::new(
        store.clone(),
        test_codec(),
        AccountSettings::from(&test_settings()),
    )
    .with_sender(sender.clone());
    (service, store, sender)
}

/// Routerize a set of routes with the account verifier installed.
pub fn account_app(service: AccountService) -> Router {
    ServiceApp::builder(test_settings())
        .verifier(Arc::new(service.clone()))
        .routes(saxum::account::account_routes(service))
        .build()
        .router()
}

/// One-shot request helper returning status and parsed JSON body.
pub async fn send_json(
    router: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Poll until `check` passes or the timeout elapses. Background tasks run
/// detached, so assertions about their side effects need to wait.
pub async fn wait_for(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within timeout");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
