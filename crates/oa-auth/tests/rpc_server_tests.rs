//! Auth RPC Server Tests
//!
//! Tests for:
//! - Success and error frames for each method
//! - Domain error to RPC code translation on the wire
//! - Malformed payloads
//! - Health endpoint
//! - Request id carried on the handler span

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use oa_auth::rpc::INTERNAL_MESSAGE;
use oa_auth::{
    Argon2Config, AuthService, HealthState, InMemoryIdentityStore, InMemorySessionStore,
    InMemoryUserStore, JwtAuthenticator, PasswordService, TokenSettings,
};
use oa_common::auth_v1::{REFRESH_TOKEN, SIGN_IN, SIGN_UP};
use oa_common::{HEALTH_PATH, REQUEST_ID_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn app() -> Router {
    let service = AuthService::new(
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemoryIdentityStore::new()),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(JwtAuthenticator::new("optimize-api")),
        Arc::new(PasswordService::new(Argon2Config::testing()).unwrap()),
        TokenSettings {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(3600),
            issuer: "optimize-api".to_string(),
        },
    );
    oa_auth::rpc::router(Arc::new(service), HealthState::new(None))
}

async fn call(app: &Router, method: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(method)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn sign_up_body(email: &str) -> String {
    json!({"email": email, "password": "Secret123", "full_name": "Ada"}).to_string()
}

#[tokio::test]
async fn test_sign_up_returns_ok_frame() {
    let app = app();

    let (status, body) = call(&app, SIGN_UP, sign_up_body("a@x.com")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["ok"]["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["ok"]["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_duplicate_sign_up_is_already_exists() {
    let app = app();
    call(&app, SIGN_UP, sign_up_body("a@x.com")).await;

    let (status, body) = call(&app, SIGN_UP, sign_up_body("a@x.com")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err"]["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_bad_credentials_are_unauthenticated() {
    let app = app();
    call(&app, SIGN_UP, sign_up_body("a@x.com")).await;

    let (_, body) = call(
        &app,
        SIGN_IN,
        json!({"email": "a@x.com", "password": "nope"}).to_string(),
    )
    .await;

    assert_eq!(body["err"]["code"], "UNAUTHENTICATED");
    assert_eq!(body["err"]["message"], "invalid credentials");
}

#[tokio::test]
async fn test_sign_in_then_refresh() {
    let app = app();
    call(&app, SIGN_UP, sign_up_body("a@x.com")).await;

    let (_, signed_in) = call(
        &app,
        SIGN_IN,
        json!({"email": "a@x.com", "password": "Secret123", "client": {"ip_address": "10.1.1.1"}})
            .to_string(),
    )
    .await;
    let refresh_token = signed_in["ok"]["refresh_token"].as_str().unwrap();

    let (_, refreshed) = call(
        &app,
        REFRESH_TOKEN,
        json!({"refresh_token": refresh_token}).to_string(),
    )
    .await;
    assert!(refreshed["ok"]["access_token"].is_string());

    let (_, replayed) = call(
        &app,
        REFRESH_TOKEN,
        json!({"refresh_token": refresh_token}).to_string(),
    )
    .await;
    assert_eq!(replayed["err"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_missing_field_is_invalid_argument() {
    let app = app();

    let (_, body) = call(&app, SIGN_IN, json!({"email": "", "password": "x"}).to_string()).await;
    assert_eq!(body["err"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_malformed_json_is_invalid_argument() {
    let app = app();

    let (status, body) = call(&app, SIGN_UP, "{not json".to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err"]["code"], "INVALID_ARGUMENT");
    assert_ne!(body["err"]["message"], INTERNAL_MESSAGE);
}

#[tokio::test]
async fn test_health_is_up() {
    let response = app()
        .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Records `(span name, request_id)` for every span opened.
#[derive(Clone, Default)]
struct SpanRecorder(Arc<Mutex<Vec<(String, String)>>>);

struct RequestIdField(Option<String>);

impl Visit for RequestIdField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "request_id" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

impl<S: Subscriber> Layer<S> for SpanRecorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut field = RequestIdField(None);
        attrs.record(&mut field);
        self.0.lock().unwrap().push((
            attrs.metadata().name().to_string(),
            field.0.unwrap_or_default(),
        ));
    }
}

#[tokio::test]
async fn test_handler_span_carries_request_id() {
    let recorder = SpanRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = app();
    let response = app
        .oneshot(
            Request::post(REFRESH_TOKEN)
                .header("content-type", "application/json")
                .header(REQUEST_ID_HEADER, "req-42")
                .body(Body::from(json!({"refresh_token": "not-a-jwt"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let spans = recorder.0.lock().unwrap().clone();
    assert!(
        spans.iter().any(|(name, id)| name == "rpc" && id == "req-42"),
        "spans: {spans:?}"
    );
}
