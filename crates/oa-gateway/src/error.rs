//! Edge error mapping.
//!
//! [`map_rpc_code`] is the only place RPC status codes become HTTP statuses
//! and envelope codes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use oa_common::{ApiResponse, ErrorCode, FieldViolation, RpcCode, RpcStatus};
use tracing::{error, warn};

/// Message for every failure collapsed into `INTERNAL_ERROR`.
pub const INTERNAL_MESSAGE: &str = "something went wrong";

/// Pure and total: every code has a target.
pub fn map_rpc_code(code: RpcCode) -> (StatusCode, ErrorCode) {
    match code {
        RpcCode::InvalidArgument => (StatusCode::BAD_REQUEST, ErrorCode::ValidationError),
        RpcCode::NotFound => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        RpcCode::Unauthenticated => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
        RpcCode::AlreadyExists => (StatusCode::CONFLICT, ErrorCode::Conflict),
        RpcCode::PermissionDenied => (StatusCode::FORBIDDEN, ErrorCode::Forbidden),
        RpcCode::ResourceExhausted => (StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimitExceeded),
        RpcCode::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, ErrorCode::InternalError),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError),
    }
}

/// A failed edge request.
#[derive(Debug)]
pub enum ApiFailure {
    /// Body could not be read or decoded
    BadRequest(String),
    /// Body decoded but broke field rules
    Validation(Vec<FieldViolation>),
    /// The backend call failed
    Rpc(RpcStatus),
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        ApiFailure::BadRequest(rejection.body_text())
    }
}

impl From<RpcStatus> for ApiFailure {
    fn from(status: RpcStatus) -> Self {
        ApiFailure::Rpc(status)
    }
}

impl From<Vec<FieldViolation>> for ApiFailure {
    fn from(violations: Vec<FieldViolation>) -> Self {
        ApiFailure::Validation(violations)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiFailure::BadRequest(message) => {
                warn!(error = %message, "Request error occurred");
                (
                    StatusCode::BAD_REQUEST,
                    ApiResponse::<()>::failure(ErrorCode::BadRequest, message),
                )
            }
            ApiFailure::Validation(details) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::failure(ErrorCode::ValidationError, "Validation error")
                    .with_details(details),
            ),
            ApiFailure::Rpc(rpc_status) => {
                let (status, code) = map_rpc_code(rpc_status.code);
                let message = if code == ErrorCode::InternalError {
                    error!(code = ?rpc_status.code, error = %rpc_status.message, "Auth backend call failed");
                    INTERNAL_MESSAGE.to_string()
                } else {
                    rpc_status.message
                };
                (status, ApiResponse::failure(code, message))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let expected = [
            (RpcCode::InvalidArgument, 400, ErrorCode::ValidationError),
            (RpcCode::NotFound, 404, ErrorCode::NotFound),
            (RpcCode::Unauthenticated, 401, ErrorCode::Unauthorized),
            (RpcCode::AlreadyExists, 409, ErrorCode::Conflict),
            (RpcCode::PermissionDenied, 403, ErrorCode::Forbidden),
            (RpcCode::ResourceExhausted, 429, ErrorCode::RateLimitExceeded),
            (RpcCode::DeadlineExceeded, 504, ErrorCode::InternalError),
            (RpcCode::Internal, 500, ErrorCode::InternalError),
            (RpcCode::Unavailable, 500, ErrorCode::InternalError),
            (RpcCode::Cancelled, 500, ErrorCode::InternalError),
        ];

        for (code, http, envelope) in expected {
            let (status, error_code) = map_rpc_code(code);
            assert_eq!(status.as_u16(), http, "{code:?}");
            assert_eq!(error_code, envelope, "{code:?}");
        }
    }

    #[test]
    fn test_mapping_is_total() {
        for code in RpcCode::ALL {
            let (status, error_code) = map_rpc_code(code);
            assert!(status.is_client_error() || status.is_server_error(), "{code:?}");
            if status.is_server_error() {
                assert_eq!(error_code, ErrorCode::InternalError, "{code:?}");
            }
        }
    }

    #[test]
    fn test_internal_detail_not_forwarded() {
        let response = ApiFailure::Rpc(RpcStatus::unavailable("no healthy instances of auth-service"))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
