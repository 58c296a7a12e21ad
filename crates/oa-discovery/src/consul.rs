//! Consul agent HTTP API backend.
//!
//! - `PUT  /v1/agent/service/register`
//! - `PUT  /v1/agent/service/deregister/{id}`
//! - `GET  /v1/health/service/{name}?tag={tag}&passing=true`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DiscoveryError, Result};
use crate::registry::{
    HealthCheckSpec, ServiceDiscovery, ServiceEndpoint, ServiceRegistration, ServiceRegistry,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    address: &'a str,
    port: u16,
    tags: &'a [String],
    check: AgentServiceCheck,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck {
    #[serde(rename = "HTTP")]
    http: String,
    interval: String,
    timeout: String,
    deregister_critical_service_after: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    node: NodeInfo,
    service: AgentService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfo {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Consul-backed registry and discovery.
pub struct ConsulRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl ConsulRegistry {
    /// `base_url` is the agent URL, e.g. `http://127.0.0.1:8500`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(DiscoveryError::Registry {
            status: status.as_u16(),
            message,
        })
    }
}

/// Consul duration string.
fn consul_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
        check: HealthCheckSpec,
    ) -> Result<()> {
        let registration = ServiceRegistration::new(instance_id, service_name, address, check)?;

        let body = AgentServiceRegistration {
            id: &registration.instance_id,
            name: &registration.service_name,
            address: &registration.host,
            port: registration.port,
            tags: &registration.tags,
            check: AgentServiceCheck {
                http: registration.health_url(),
                interval: consul_duration(registration.check.interval),
                timeout: consul_duration(registration.check.timeout),
                deregister_critical_service_after: consul_duration(
                    registration.check.deregister_after,
                ),
            },
        };

        let response = self
            .client
            .put(format!("{}/v1/agent/service/register", self.base_url))
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        info!(
            instance_id = %instance_id,
            service_name = %service_name,
            address = %address,
            "Registered service instance with Consul"
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<()> {
        let response = self
            .client
            .put(format!(
                "{}/v1/agent/service/deregister/{}",
                self.base_url, instance_id
            ))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(instance_id = %instance_id, "Instance already absent from Consul");
            return Ok(());
        }
        Self::ensure_success(response).await?;

        info!(
            instance_id = %instance_id,
            service_name = %service_name,
            "Deregistered service instance from Consul"
        );
        Ok(())
    }
}

#[async_trait]
impl ServiceDiscovery for ConsulRegistry {
    async fn resolve(&self, service_name: &str, tag: &str) -> Result<Vec<ServiceEndpoint>> {
        let response = self
            .client
            .get(format!("{}/v1/health/service/{}", self.base_url, service_name))
            .query(&[("tag", tag), ("passing", "true")])
            .send()
            .await?;
        let entries: Vec<ServiceEntry> = Self::ensure_success(response).await?.json().await?;

        let mut endpoints: Vec<ServiceEndpoint> = entries
            .into_iter()
            .map(|entry| {
                let host = if entry.service.address.is_empty() {
                    entry.node.address
                } else {
                    entry.service.address
                };
                ServiceEndpoint {
                    instance_id: entry.service.id,
                    service_name: entry.service.service,
                    host,
                    port: entry.service.port,
                    tags: entry.service.tags.unwrap_or_default(),
                }
            })
            .collect();
        endpoints.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

        debug!(service_name = %service_name, count = endpoints.len(), "Resolved endpoints from Consul");
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consul_duration() {
        assert_eq!(consul_duration(Duration::from_secs(30)), "30s");
        assert_eq!(consul_duration(Duration::from_secs(60)), "60s");
        assert_eq!(consul_duration(Duration::from_millis(1500)), "1500ms");
    }
}
