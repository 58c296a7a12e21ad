//! Registry and discovery capabilities plus the records they exchange.

use std::time::Duration;

use async_trait::async_trait;
use oa_common::{HEALTH_PATH, RPC_TAG};

use crate::error::{DiscoveryError, Result};

/// Active health probe attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    /// Time between probes
    pub interval: Duration,
    /// Per-probe timeout
    pub timeout: Duration,
    /// Evict the instance once it has been failing for this long
    pub deregister_after: Duration,
    /// HTTP path probed on the instance
    pub path: String,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            deregister_after: Duration::from_secs(60),
            path: HEALTH_PATH.to_string(),
        }
    }
}

impl HealthCheckSpec {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_deregister_after(mut self, deregister_after: Duration) -> Self {
        self.deregister_after = deregister_after;
        self
    }
}

/// A validated registration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub instance_id: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: HealthCheckSpec,
}

impl ServiceRegistration {
    /// Build a registration from a `host:port` address. The address must
    /// split into exactly two parts on `:` with a numeric port.
    pub fn new(
        instance_id: &str,
        service_name: &str,
        address: &str,
        check: HealthCheckSpec,
    ) -> Result<Self> {
        let (host, port) = split_address(address)?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
            host,
            port,
            tags: vec![RPC_TAG.to_string()],
            check,
        })
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint {
            instance_id: self.instance_id.clone(),
            service_name: self.service_name.clone(),
            host: self.host.clone(),
            port: self.port,
            tags: self.tags.clone(),
        }
    }

    /// URL the registry probes.
    pub fn health_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.check.path)
    }
}

/// A resolvable network location of one live instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub instance_id: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub tags: Vec<String>,
}

impl ServiceEndpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Publishes backend instances under a logical service name.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Register `address` (`host:port`) with the given health probe.
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
        check: HealthCheckSpec,
    ) -> Result<()>;

    /// Remove an instance. Removing an unknown instance succeeds.
    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<()>;
}

/// Resolves a logical service name to its live endpoints.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Healthy instances carrying `tag`, ordered by instance id.
    async fn resolve(&self, service_name: &str, tag: &str) -> Result<Vec<ServiceEndpoint>>;
}

/// Split `host:port`.
pub fn split_address(address: &str) -> Result<(String, u16)> {
    let invalid = |reason: &str| DiscoveryError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = address.split(':').collect();
    if parts.len() != 2 {
        return Err(invalid("expected host:port"));
    }
    if parts[0].is_empty() {
        return Err(invalid("missing host"));
    }
    let port = parts[1]
        .parse::<u16>()
        .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

    Ok((parts[0].to_string(), port))
}
