//! Consul Registry Tests
//!
//! Tests for:
//! - Registration payload (address split, tag, health check)
//! - Idempotent deregistration
//! - Healthy-instance queries and node address fallback

use std::time::Duration;

use oa_discovery::{ConsulRegistry, DiscoveryError, HealthCheckSpec, ServiceDiscovery, ServiceRegistry};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(server: &MockServer) -> ConsulRegistry {
    ConsulRegistry::new(server.uri(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_register_sends_agent_payload() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .and(body_partial_json(json!({
            "ID": "auth-1",
            "Name": "auth-service",
            "Address": "10.0.0.5",
            "Port": 9000,
            "Tags": ["grpc"],
            "Check": {
                "HTTP": "http://10.0.0.5:9000/health",
                "Interval": "30s",
                "Timeout": "5s",
                "DeregisterCriticalServiceAfter": "60s"
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    registry(&server)
        .register("auth-1", "auth-service", "10.0.0.5:9000", HealthCheckSpec::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_rejects_bad_address_without_calling_agent() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = registry(&server)
        .register("auth-1", "auth-service", "10.0.0.5-9000", HealthCheckSpec::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidAddress { .. }));
}

#[tokio::test]
async fn test_register_surfaces_agent_error() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent unavailable"))
        .mount(&server)
        .await;

    let err = registry(&server)
        .register("auth-1", "auth-service", "10.0.0.5:9000", HealthCheckSpec::default())
        .await
        .unwrap_err();
    match err {
        DiscoveryError::Registry { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "agent unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_deregister_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/auth-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/auth-2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown service ID"))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server);
    registry.deregister("auth-1", "auth-service").await.unwrap();
    registry.deregister("auth-2", "auth-service").await.unwrap();
}

#[tokio::test]
async fn test_resolve_queries_passing_tagged_instances() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/health/service/auth-service"))
        .and(query_param("tag", "grpc"))
        .and(query_param("passing", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Node": {"Address": "192.168.1.20"},
                "Service": {"ID": "auth-2", "Service": "auth-service", "Address": "", "Port": 9001, "Tags": ["grpc"]}
            },
            {
                "Node": {"Address": "192.168.1.10"},
                "Service": {"ID": "auth-1", "Service": "auth-service", "Address": "10.0.0.5", "Port": 9000, "Tags": ["grpc"]}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = registry(&server).resolve("auth-service", "grpc").await.unwrap();

    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].instance_id, "auth-1");
    assert_eq!(endpoints[0].address(), "10.0.0.5:9000");
    // Empty service address falls back to the node address
    assert_eq!(endpoints[1].address(), "192.168.1.20:9001");
}

#[tokio::test]
async fn test_resolve_empty_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/health/service/auth-service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let endpoints = registry(&server).resolve("auth-service", "grpc").await.unwrap();
    assert!(endpoints.is_empty());
}
