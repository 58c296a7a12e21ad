//! Auth RPC server.
//!
//! Every method replies HTTP 200 with an [`RpcFrame`]; failures travel in
//! the frame, not in the HTTP status. Domain errors are translated to RPC
//! status codes here and nowhere else.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use oa_common::auth_v1::{
    RefreshTokenRequest, SignInRequest, SignUpRequest, TokenPair, REFRESH_TOKEN, SIGN_IN, SIGN_UP,
};
use oa_common::{RequestContext, RpcCode, RpcFrame, RpcStatus, REQUEST_ID_HEADER, TIMEOUT_HEADER};
use tracing::{debug, error, info_span, Instrument};

use crate::auth::auth_service::AuthService;
use crate::shared::error::AuthError;
use crate::shared::health_api::{health_router, HealthState};

/// Message for every collapsed internal failure.
pub const INTERNAL_MESSAGE: &str = "something went wrong";

impl AuthError {
    /// Translate to the RPC status sent over the wire.
    pub fn to_rpc_status(&self) -> RpcStatus {
        match self {
            AuthError::InvalidCredentials => {
                RpcStatus::new(RpcCode::Unauthenticated, "invalid credentials")
            }
            AuthError::Unauthorized { .. }
            | AuthError::TokenExpired
            | AuthError::InvalidToken { .. } => {
                RpcStatus::new(RpcCode::Unauthenticated, self.to_string())
            }
            AuthError::UserAlreadyExists => {
                RpcStatus::new(RpcCode::AlreadyExists, "user already exists")
            }
            AuthError::Duplicate { .. } => RpcStatus::new(RpcCode::AlreadyExists, self.to_string()),
            AuthError::Validation { message } => {
                RpcStatus::new(RpcCode::InvalidArgument, message.clone())
            }
            AuthError::NotFound { .. } => RpcStatus::new(RpcCode::NotFound, self.to_string()),
            AuthError::Forbidden { message } => {
                RpcStatus::new(RpcCode::PermissionDenied, message.clone())
            }
            AuthError::RateLimited { message } => {
                RpcStatus::new(RpcCode::ResourceExhausted, message.clone())
            }
            AuthError::DeadlineExceeded => RpcStatus::deadline_exceeded(),
            AuthError::Database(_) | AuthError::Serialization(_) | AuthError::Internal { .. } => {
                RpcStatus::internal(INTERNAL_MESSAGE)
            }
        }
    }
}

/// RPC routes plus `GET /health`.
pub fn router(service: Arc<AuthService>, health: HealthState) -> Router {
    Router::new()
        .route(SIGN_IN, post(sign_in))
        .route(SIGN_UP, post(sign_up))
        .route(REFRESH_TOKEN, post(refresh_token))
        .with_state(service)
        .merge(health_router(health))
}

fn context_from(headers: &HeaderMap) -> RequestContext {
    RequestContext::from_headers(
        headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()),
        headers.get(TIMEOUT_HEADER).and_then(|v| v.to_str().ok()),
    )
}

async fn sign_in(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Json<RpcFrame<TokenPair>> {
    let ctx = context_from(&headers);
    let request = match decode(SIGN_IN, payload) {
        Ok(request) => request,
        Err(frame) => return Json(frame),
    };
    let span = info_span!("rpc", method = SIGN_IN, request_id = %ctx.request_id());
    let result = ctx.run(service.sign_in(&ctx, request)).instrument(span).await;
    reply(SIGN_IN, &ctx, result.unwrap_or_else(|d| Err(d.into())))
}

async fn sign_up(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Json<RpcFrame<TokenPair>> {
    let ctx = context_from(&headers);
    let request = match decode(SIGN_UP, payload) {
        Ok(request) => request,
        Err(frame) => return Json(frame),
    };
    let span = info_span!("rpc", method = SIGN_UP, request_id = %ctx.request_id());
    let result = ctx.run(service.sign_up(&ctx, request)).instrument(span).await;
    reply(SIGN_UP, &ctx, result.unwrap_or_else(|d| Err(d.into())))
}

async fn refresh_token(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Json<RpcFrame<TokenPair>> {
    let ctx = context_from(&headers);
    let request = match decode(REFRESH_TOKEN, payload) {
        Ok(request) => request,
        Err(frame) => return Json(frame),
    };
    let span = info_span!("rpc", method = REFRESH_TOKEN, request_id = %ctx.request_id());
    let result = ctx.run(service.refresh_token(&ctx, request)).instrument(span).await;
    reply(REFRESH_TOKEN, &ctx, result.unwrap_or_else(|d| Err(d.into())))
}

fn decode<Req>(
    method: &'static str,
    payload: Result<Json<Req>, JsonRejection>,
) -> Result<Req, RpcFrame<TokenPair>> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            debug!(method, error = %rejection, "Rejected malformed request");
            Err(RpcFrame::Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                rejection.body_text(),
            )))
        }
    }
}

fn reply(
    method: &'static str,
    ctx: &RequestContext,
    result: Result<TokenPair, AuthError>,
) -> Json<RpcFrame<TokenPair>> {
    match result {
        Ok(pair) => Json(RpcFrame::Ok(pair)),
        Err(e) => {
            let status = e.to_rpc_status();
            if status.code == RpcCode::Internal {
                error!(method, request_id = %ctx.request_id(), error = %e, "Request failed");
            } else {
                debug!(method, request_id = %ctx.request_id(), code = ?status.code, "Request rejected");
            }
            Json(RpcFrame::Err(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_translate_once() {
        let cases = [
            (AuthError::InvalidCredentials, RpcCode::Unauthenticated),
            (AuthError::TokenExpired, RpcCode::Unauthenticated),
            (AuthError::invalid_token("stale"), RpcCode::Unauthenticated),
            (AuthError::UserAlreadyExists, RpcCode::AlreadyExists),
            (AuthError::duplicate("User", "email", "a@x.com"), RpcCode::AlreadyExists),
            (AuthError::validation("email is required"), RpcCode::InvalidArgument),
            (AuthError::not_found("Identity", "u"), RpcCode::NotFound),
            (
                AuthError::Forbidden { message: "no".into() },
                RpcCode::PermissionDenied,
            ),
            (
                AuthError::RateLimited { message: "slow down".into() },
                RpcCode::ResourceExhausted,
            ),
            (AuthError::DeadlineExceeded, RpcCode::DeadlineExceeded),
            (AuthError::internal("disk on fire"), RpcCode::Internal),
        ];

        for (error, code) in cases {
            assert_eq!(error.to_rpc_status().code, code, "{error:?}");
        }
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let status = AuthError::internal("connection refused to 10.0.0.9").to_rpc_status();
        assert_eq!(status.message, INTERNAL_MESSAGE);
    }
}
