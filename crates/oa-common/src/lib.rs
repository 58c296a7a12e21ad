//! Types shared across the auth backend and the edge gateway: the response
//! envelope, the RPC contract, the per-request context and logging setup.

pub mod context;
pub mod envelope;
pub mod logging;
pub mod rpc;
pub mod validation;

pub use context::{DeadlineExceeded, RequestContext, REQUEST_ID_HEADER, TIMEOUT_HEADER};
pub use envelope::{ApiErrorBody, ApiResponse, ErrorCode, FieldViolation};
pub use rpc::{auth_v1, RpcCode, RpcFrame, RpcStatus};
pub use validation::{normalize_email, EmailRule};

/// Tag attached to every RPC-serving registration and required by discovery.
pub const RPC_TAG: &str = "grpc";

/// Path of the health endpoint probed by the registry.
pub const HEALTH_PATH: &str = "/health";
