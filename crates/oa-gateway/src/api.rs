//! Edge HTTP API
//!
//! - POST /auth/login - Password sign-in
//! - POST /auth/signup - Account creation
//! - POST /auth/refresh - Token rotation
//! - GET /health - Liveness
//! - GET /api-docs/openapi.json - OpenAPI document

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use oa_common::auth_v1::{self, ClientInfo};
use oa_common::{
    ApiErrorBody, ApiResponse, ErrorCode, FieldViolation, RequestContext, HEALTH_PATH,
    REQUEST_ID_HEADER,
};
use serde::Serialize;
use tracing::{info_span, Instrument};
use utoipa::{OpenApi, ToSchema};

use crate::client::AuthApi;
use crate::error::ApiFailure;
use crate::payload::{LoginRequest, RefreshRequest, SignUpRequest, TokenResponse};
use crate::validation::Validator;

/// Default request body limit (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Shared router state
#[derive(Clone)]
pub struct GatewayState {
    pub auth: Arc<dyn AuthApi>,
    pub validator: Arc<Validator>,
    pub request_timeout: Duration,
}

impl GatewayState {
    pub fn new(auth: Arc<dyn AuthApi>, validator: Arc<Validator>, request_timeout: Duration) -> Self {
        Self {
            auth,
            validator,
            request_timeout,
        }
    }

    /// Every edge request gets a fresh deadline.
    fn context(&self, headers: &HeaderMap) -> RequestContext {
        RequestContext::from_headers(header(headers, REQUEST_ID_HEADER), None)
            .timeout(self.request_timeout)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: header(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        user_agent: header(headers, "user-agent").map(str::to_string),
    }
}

type ApiResult = Result<Json<ApiResponse<TokenResponse>>, ApiFailure>;

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Malformed or invalid request", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = ApiResponse<TokenResponse>)
    )
)]
pub async fn login(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    state.validator.check(&request)?;

    let ctx = state.context(&headers);
    let pair = state
        .auth
        .sign_in(
            &ctx,
            auth_v1::SignInRequest {
                email: request.email,
                password: request.password,
                client: client_info(&headers),
            },
        )
        .instrument(info_span!("auth_call", method = auth_v1::SIGN_IN, request_id = %ctx.request_id()))
        .await?;

    Ok(Json(ApiResponse::success(pair.into())))
}

/// Create an account and sign in
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Malformed or invalid request", body = ApiResponse<TokenResponse>),
        (status = 409, description = "Email already registered", body = ApiResponse<TokenResponse>)
    )
)]
pub async fn signup(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    state.validator.check(&request)?;

    let ctx = state.context(&headers);
    let pair = state
        .auth
        .sign_up(
            &ctx,
            auth_v1::SignUpRequest {
                email: request.email,
                password: request.password,
                full_name: request.full_name,
                client: client_info(&headers),
            },
        )
        .instrument(info_span!("auth_call", method = auth_v1::SIGN_UP, request_id = %ctx.request_id()))
        .await?;

    Ok(Json(ApiResponse::success(pair.into())))
}

/// Rotate the session's token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Refresh token invalid or expired", body = ApiResponse<TokenResponse>)
    )
)]
pub async fn refresh(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    state.validator.check(&request)?;

    let ctx = state.context(&headers);
    let pair = state
        .auth
        .refresh_token(
            &ctx,
            auth_v1::RefreshTokenRequest {
                refresh_token: request.refresh_token,
            },
        )
        .instrument(info_span!("auth_call", method = auth_v1::REFRESH_TOKEN, request_id = %ctx.request_id()))
        .await?;

    Ok(Json(ApiResponse::success(pair.into())))
}

/// Gateway health
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Gateway is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(login, signup, refresh, health),
    components(schemas(
        LoginRequest,
        SignUpRequest,
        RefreshRequest,
        TokenResponse,
        ApiErrorBody,
        ErrorCode,
        FieldViolation,
        HealthResponse
    )),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the edge router
pub fn router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/refresh", post(refresh))
        .route(HEALTH_PATH, get(health))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
