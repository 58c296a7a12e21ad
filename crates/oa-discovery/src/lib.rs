//! Service registry and discovery.
//!
//! Backends publish themselves through a [`ServiceRegistry`]; the gateway
//! resolves them through a [`ServiceDiscovery`] and talks to them over a
//! [`ServiceConnection`] that follows membership changes without
//! reconnecting.
//!
//! Two registry backends are provided:
//! - [`ConsulRegistry`]: Consul agent HTTP API
//! - [`InMemoryRegistry`]: in-process, with active HTTP health probing

pub mod balancer;
pub mod consul;
pub mod error;
pub mod memory;
pub mod registry;
pub mod resolver;

pub use balancer::{LoadBalancer, PickFirst, RoundRobin};
pub use consul::ConsulRegistry;
pub use error::{DiscoveryError, Result};
pub use memory::{CheckStatus, HealthProber, HttpHealthProber, InMemoryRegistry};
pub use registry::{
    split_address, HealthCheckSpec, ServiceDiscovery, ServiceEndpoint, ServiceRegistration,
    ServiceRegistry,
};
pub use resolver::{ResolverConfig, ServiceConnection, ServiceResolver};
