//! Edge adapter.
//!
//! Decodes and validates HTTP requests, calls the auth backend through a
//! discovery-backed connection, and writes every outcome as an
//! [`ApiResponse`](oa_common::ApiResponse) envelope.

pub mod api;
pub mod client;
pub mod error;
pub mod payload;
pub mod validation;

pub use api::{router, ApiDoc, GatewayState, DEFAULT_MAX_BODY_BYTES};
pub use client::{AuthApi, AuthServiceClient};
pub use error::{map_rpc_code, ApiFailure, INTERNAL_MESSAGE};
pub use payload::{LoginRequest, RefreshRequest, SignUpRequest, TokenResponse};
pub use validation::{Validate, Validator};
