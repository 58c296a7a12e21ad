//! Health Check Endpoint
//!
//! `GET /health` is the target of the registry's active probe: 200 while
//! every dependency check passes, 503 otherwise.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use oa_common::HEALTH_PATH;
use serde::Serialize;

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Individual health check result
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,

    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
}

/// A dependency whose reachability decides the service's health.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self) -> HealthCheck;
}

/// MongoDB health checker
pub struct MongoHealthChecker {
    pub db: mongodb::Database,
}

#[async_trait]
impl HealthChecker for MongoHealthChecker {
    async fn check(&self) -> HealthCheck {
        let start = Instant::now();

        match self.db.run_command(mongodb::bson::doc! { "ping": 1 }).await {
            Ok(_) => HealthCheck {
                name: "mongodb".to_string(),
                status: HealthStatus::Up,
                message: None,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(e) => HealthCheck {
                name: "mongodb".to_string(),
                status: HealthStatus::Down,
                message: Some(format!("Connection failed: {}", e)),
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        }
    }
}

/// Health service state
#[derive(Clone, Default)]
pub struct HealthState {
    checkers: Vec<Arc<dyn HealthChecker>>,
    version: Option<String>,
}

impl HealthState {
    pub fn new(version: Option<String>) -> Self {
        Self {
            checkers: Vec::new(),
            version,
        }
    }

    pub fn with_checker(mut self, checker: Arc<dyn HealthChecker>) -> Self {
        self.checkers.push(checker);
        self
    }
}

pub async fn get_health(State(state): State<HealthState>) -> Response {
    let mut checks = Vec::with_capacity(state.checkers.len());
    for checker in &state.checkers {
        checks.push(checker.check().await);
    }

    let status = if checks.iter().all(|c| c.status == HealthStatus::Up) {
        HealthStatus::Up
    } else {
        HealthStatus::Down
    };

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        version: state.version.clone(),
        checks,
    };

    let status_code = match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// Create the health router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(get_health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct Fixed(HealthStatus);

    #[async_trait]
    impl HealthChecker for Fixed {
        async fn check(&self) -> HealthCheck {
            HealthCheck {
                name: "fixed".to_string(),
                status: self.0,
                message: None,
                duration_ms: None,
            }
        }
    }

    async fn status_of(state: HealthState) -> StatusCode {
        health_router(state)
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Down).unwrap(), "\"DOWN\"");
    }

    #[tokio::test]
    async fn test_no_checkers_is_up() {
        assert_eq!(status_of(HealthState::new(None)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failing_checker_is_unavailable() {
        let state = HealthState::new(Some("0.1.0".to_string()))
            .with_checker(Arc::new(Fixed(HealthStatus::Up)))
            .with_checker(Arc::new(Fixed(HealthStatus::Down)));
        assert_eq!(status_of(state).await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
