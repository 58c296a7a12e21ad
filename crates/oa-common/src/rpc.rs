//! RPC wire contract between the edge gateway and the auth backend.
//!
//! Calls are `POST {method}` with a JSON request body. Every reply is an
//! [`RpcFrame`]: `{"ok": <response>}` or `{"err": {"code", "message"}}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    pub const ALL: [RpcCode; 17] = [
        RpcCode::Ok,
        RpcCode::Cancelled,
        RpcCode::Unknown,
        RpcCode::InvalidArgument,
        RpcCode::DeadlineExceeded,
        RpcCode::NotFound,
        RpcCode::AlreadyExists,
        RpcCode::PermissionDenied,
        RpcCode::ResourceExhausted,
        RpcCode::FailedPrecondition,
        RpcCode::Aborted,
        RpcCode::OutOfRange,
        RpcCode::Unimplemented,
        RpcCode::Internal,
        RpcCode::Unavailable,
        RpcCode::DataLoss,
        RpcCode::Unauthenticated,
    ];
}

/// An RPC failure as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(RpcCode::DeadlineExceeded, "deadline exceeded")
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error: code = {:?} desc = {}", self.code, self.message)
    }
}

impl std::error::Error for RpcStatus {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcFrame<T> {
    Ok(T),
    Err(RpcStatus),
}

impl<T> From<Result<T, RpcStatus>> for RpcFrame<T> {
    fn from(result: Result<T, RpcStatus>) -> Self {
        match result {
            Ok(value) => RpcFrame::Ok(value),
            Err(status) => RpcFrame::Err(status),
        }
    }
}

impl<T> From<RpcFrame<T>> for Result<T, RpcStatus> {
    fn from(frame: RpcFrame<T>) -> Self {
        match frame {
            RpcFrame::Ok(value) => Ok(value),
            RpcFrame::Err(status) => Err(status),
        }
    }
}

/// `auth.v1.AuthService` messages and method paths.
pub mod auth_v1 {
    use serde::{Deserialize, Serialize};

    pub const SERVICE: &str = "auth.v1.AuthService";
    pub const SIGN_IN: &str = "/auth.v1.AuthService/SignIn";
    pub const SIGN_UP: &str = "/auth.v1.AuthService/SignUp";
    pub const REFRESH_TOKEN: &str = "/auth.v1.AuthService/RefreshToken";

    /// Client metadata forwarded by the edge and stored on the session.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ClientInfo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ip_address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub user_agent: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SignInRequest {
        pub email: String,
        pub password: String,
        #[serde(default)]
        pub client: ClientInfo,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SignUpRequest {
        pub email: String,
        pub password: String,
        pub full_name: String,
        #[serde(default)]
        pub client: ClientInfo,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RefreshTokenRequest {
        pub refresh_token: String,
    }

    /// Reply shared by every method.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TokenPair {
        pub access_token: String,
        pub refresh_token: String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&RpcCode::Unauthenticated).unwrap(),
            "\"UNAUTHENTICATED\""
        );
        assert_eq!(
            serde_json::to_string(&RpcCode::DeadlineExceeded).unwrap(),
            "\"DEADLINE_EXCEEDED\""
        );
    }

    #[test]
    fn test_error_frame_shape() {
        let frame: RpcFrame<auth_v1::TokenPair> =
            RpcFrame::Err(RpcStatus::new(RpcCode::AlreadyExists, "user already exists"));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["err"]["code"], "ALREADY_EXISTS");
        assert_eq!(json["err"]["message"], "user already exists");
    }

    #[test]
    fn test_ok_frame_into_result() {
        let json = r#"{"ok":{"access_token":"a","refresh_token":"r"}}"#;
        let frame: RpcFrame<auth_v1::TokenPair> = serde_json::from_str(json).unwrap();
        let result: Result<_, RpcStatus> = frame.into();
        assert_eq!(result.unwrap().refresh_token, "r");
    }
}
