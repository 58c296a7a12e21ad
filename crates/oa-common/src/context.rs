//! Per-request context carrying the request id and the deadline that every
//! downstream store and RPC call must honour.

use std::future::IntoFuture;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Header carrying the caller's remaining budget in milliseconds.
pub const TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Header carrying the request id across the gateway/backend hop.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The request deadline passed before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline. Used for startup work and tests.
    pub fn background() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Tighten the deadline to `timeout` from now. A later deadline never
    /// replaces an earlier one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Rebuild a context from transport headers. Missing or unparsable
    /// values fall back to no deadline and a fresh request id.
    pub fn from_headers(request_id: Option<&str>, timeout_ms: Option<&str>) -> Self {
        let mut ctx = Self::background();
        if let Some(id) = request_id.filter(|id| !id.is_empty()) {
            ctx.request_id = id.to_string();
        }
        if let Some(ms) = timeout_ms.and_then(|v| v.trim().parse::<u64>().ok()) {
            ctx = ctx.timeout(Duration::from_millis(ms));
        }
        ctx
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }

    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.is_expired() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Drive `fut` to completion or until the deadline passes, whichever
    /// comes first. The future is dropped on expiry.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: IntoFuture,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut.into_future())
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
