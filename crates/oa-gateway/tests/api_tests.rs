//! Edge API Tests
//!
//! Tests for:
//! - Success envelope shape
//! - Malformed JSON, unknown fields and oversized bodies
//! - Validation details
//! - Backend status to envelope mapping
//! - Deadline and client metadata forwarding

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use oa_common::auth_v1::{RefreshTokenRequest, SignInRequest, SignUpRequest, TokenPair};
use oa_common::{RequestContext, RpcCode, RpcStatus};
use oa_gateway::{router, AuthApi, GatewayState, Validator, DEFAULT_MAX_BODY_BYTES, INTERNAL_MESSAGE};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Records what reached the backend and replies with a fixed outcome.
struct FakeAuth {
    reply: Result<TokenPair, RpcStatus>,
    last_sign_in: Mutex<Option<SignInRequest>>,
    last_deadline: Mutex<Option<Duration>>,
}

impl FakeAuth {
    fn replying(reply: Result<TokenPair, RpcStatus>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            last_sign_in: Mutex::new(None),
            last_deadline: Mutex::new(None),
        })
    }

    fn ok() -> Arc<Self> {
        Self::replying(Ok(TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }))
    }

    fn record(&self, ctx: &RequestContext) -> Result<TokenPair, RpcStatus> {
        *self.last_deadline.lock() = ctx.remaining();
        self.reply.clone()
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn sign_in(&self, ctx: &RequestContext, request: SignInRequest) -> Result<TokenPair, RpcStatus> {
        *self.last_sign_in.lock() = Some(request);
        self.record(ctx)
    }

    async fn sign_up(&self, ctx: &RequestContext, _request: SignUpRequest) -> Result<TokenPair, RpcStatus> {
        self.record(ctx)
    }

    async fn refresh_token(
        &self,
        ctx: &RequestContext,
        _request: RefreshTokenRequest,
    ) -> Result<TokenPair, RpcStatus> {
        self.record(ctx)
    }
}

fn app(auth: Arc<FakeAuth>) -> Router {
    router(
        GatewayState::new(auth, Arc::new(Validator::new()), Duration::from_secs(10)),
        DEFAULT_MAX_BODY_BYTES,
    )
}

async fn post(app: Router, path: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .header("user-agent", "api-tests")
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn login_body() -> String {
    json!({"email": "a@x.com", "password": "Secret123"}).to_string()
}

#[tokio::test]
async fn test_login_success_envelope() {
    let (status, body) = post(app(FakeAuth::ok()), "/auth/login", login_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["access_token"], "access");
    assert_eq!(body["data"]["refresh_token"], "refresh");
    assert!(body.get("error").is_none());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_login_forwards_deadline_and_client() {
    let auth = FakeAuth::ok();
    post(app(auth.clone()), "/auth/login", login_body()).await;

    let deadline = auth.last_deadline.lock().expect("deadline set");
    assert!(deadline <= Duration::from_secs(10));
    assert!(deadline > Duration::from_secs(5));

    let request = auth.last_sign_in.lock().clone().unwrap();
    assert_eq!(request.client.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(request.client.user_agent.as_deref(), Some("api-tests"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (status, body) = post(app(FakeAuth::ok()), "/auth/login", "{\"email\":").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_unknown_field_is_bad_request() {
    let body = json!({"email": "a@x.com", "password": "p", "role": "admin"}).to_string();
    let (status, body) = post(app(FakeAuth::ok()), "/auth/login", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_oversized_body_is_bad_request() {
    let padding = "x".repeat(DEFAULT_MAX_BODY_BYTES + 1);
    let body = json!({"email": "a@x.com", "password": padding}).to_string();
    let (status, body) = post(app(FakeAuth::ok()), "/auth/login", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_validation_details() {
    let body = json!({"email": "not-an-email", "full_name": "Ada"}).to_string();
    let auth = FakeAuth::ok();
    let (status, body) = post(app(auth.clone()), "/auth/signup", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let details = body["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["field"], "email");
    assert_eq!(details[0]["value"], "not-an-email");
    assert_eq!(details[1]["field"], "password");
    // Never reached the backend
    assert!(auth.last_deadline.lock().is_none());
}

#[tokio::test]
async fn test_backend_statuses_mapped() {
    let cases = [
        (RpcCode::Unauthenticated, StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        (RpcCode::AlreadyExists, StatusCode::CONFLICT, "CONFLICT"),
        (RpcCode::InvalidArgument, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        (RpcCode::ResourceExhausted, StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
        (RpcCode::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT, "INTERNAL_ERROR"),
        (RpcCode::Unavailable, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    ];

    for (code, http, envelope) in cases {
        let auth = FakeAuth::replying(Err(RpcStatus::new(code, "backend said no")));
        let (status, body) = post(app(auth), "/auth/login", login_body()).await;

        assert_eq!(status, http, "{code:?}");
        assert_eq!(body["error"]["code"], envelope, "{code:?}");
        if envelope == "INTERNAL_ERROR" {
            assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
        } else {
            assert_eq!(body["error"]["message"], "backend said no");
        }
    }
}

#[tokio::test]
async fn test_refresh_route() {
    let body = json!({"refresh_token": "r"}).to_string();
    let (status, body) = post(app(FakeAuth::ok()), "/auth/refresh", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["access_token"], "access");
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = app(FakeAuth::ok());

    let health = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let docs = app
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(docs.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(docs.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(doc["paths"]["/auth/login"].is_object());
    assert!(doc["paths"]["/auth/signup"].is_object());
}
