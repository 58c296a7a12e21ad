//! In-process registry with active health probing.
//!
//! Each registration gets a background task that probes the instance on its
//! check interval. An instance is resolvable only while its last probe
//! passed, and is evicted once it has been critical for longer than
//! `deregister_after`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::{
    HealthCheckSpec, ServiceDiscovery, ServiceEndpoint, ServiceRegistration, ServiceRegistry,
};

/// Performs one health probe against a registered instance.
#[async_trait]
pub trait HealthProber: Send + Sync {
    async fn probe(&self, registration: &ServiceRegistration) -> bool;
}

/// Probes `GET http://host:port{path}`; any 2xx passes.
pub struct HttpHealthProber {
    client: reqwest::Client,
}

impl HttpHealthProber {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpHealthProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProber for HttpHealthProber {
    async fn probe(&self, registration: &ServiceRegistration) -> bool {
        match self
            .client
            .get(registration.health_url())
            .timeout(registration.check.timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(instance_id = %registration.instance_id, error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passing,
    Critical,
}

struct Instance {
    registration: ServiceRegistration,
    generation: u64,
    status: CheckStatus,
    critical_since: Option<Instant>,
    shutdown_tx: broadcast::Sender<()>,
}

#[derive(Default)]
struct RegistryState {
    instances: HashMap<String, Instance>,
    next_generation: u64,
}

pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
    prober: Arc<dyn HealthProber>,
}

impl InMemoryRegistry {
    pub fn new(prober: Arc<dyn HealthProber>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            prober,
        }
    }

    /// Registry that probes instances over HTTP.
    pub fn with_http_probes() -> Self {
        Self::new(Arc::new(HttpHealthProber::new()))
    }

    pub fn status(&self, instance_id: &str) -> Option<CheckStatus> {
        self.state
            .read()
            .instances
            .get(instance_id)
            .map(|instance| instance.status)
    }

    pub fn instance_count(&self) -> usize {
        self.state.read().instances.len()
    }
}

async fn probe_once(prober: &dyn HealthProber, registration: &ServiceRegistration) -> bool {
    tokio::time::timeout(registration.check.timeout, prober.probe(registration))
        .await
        .unwrap_or(false)
}

/// Apply a probe result. Returns false once the loop for `generation`
/// should stop.
fn record_probe(
    state: &RwLock<RegistryState>,
    instance_id: &str,
    generation: u64,
    passing: bool,
) -> bool {
    let mut state = state.write();
    let Some(instance) = state.instances.get_mut(instance_id) else {
        return false;
    };
    if instance.generation != generation {
        return false;
    }

    if passing {
        if instance.status == CheckStatus::Critical {
            info!(instance_id = %instance_id, "Instance health check passing");
        }
        instance.status = CheckStatus::Passing;
        instance.critical_since = None;
        return true;
    }

    let now = Instant::now();
    if instance.status == CheckStatus::Passing {
        warn!(instance_id = %instance_id, "Instance health check critical");
    }
    instance.status = CheckStatus::Critical;
    let since = *instance.critical_since.get_or_insert(now);

    if now.duration_since(since) >= instance.registration.check.deregister_after {
        let service_name = instance.registration.service_name.clone();
        state.instances.remove(instance_id);
        warn!(
            instance_id = %instance_id,
            service_name = %service_name,
            "Evicted instance after failing health checks"
        );
        return false;
    }
    true
}

fn spawn_probe_loop(
    state: Arc<RwLock<RegistryState>>,
    prober: Arc<dyn HealthProber>,
    registration: ServiceRegistration,
    generation: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let period = registration.check.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let passing = probe_once(prober.as_ref(), &registration).await;
                    if !record_probe(&state, &registration.instance_id, generation, passing) {
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!(instance_id = %registration.instance_id, "Stopping health probes");
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl ServiceRegistry for InMemoryRegistry {
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
        check: HealthCheckSpec,
    ) -> Result<()> {
        let registration = ServiceRegistration::new(instance_id, service_name, address, check)?;

        // First probe runs before the instance becomes visible.
        let passing = probe_once(self.prober.as_ref(), &registration).await;
        let status = if passing {
            CheckStatus::Passing
        } else {
            CheckStatus::Critical
        };

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let generation = {
            let mut state = self.state.write();
            state.next_generation += 1;
            let generation = state.next_generation;
            let previous = state.instances.insert(
                instance_id.to_string(),
                Instance {
                    registration: registration.clone(),
                    generation,
                    status,
                    critical_since: (!passing).then(Instant::now),
                    shutdown_tx,
                },
            );
            if let Some(previous) = previous {
                let _ = previous.shutdown_tx.send(());
            }
            generation
        };

        info!(
            instance_id = %instance_id,
            service_name = %service_name,
            address = %address,
            status = ?status,
            "Registered service instance"
        );

        spawn_probe_loop(
            self.state.clone(),
            self.prober.clone(),
            registration,
            generation,
            shutdown_rx,
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<()> {
        let removed = self.state.write().instances.remove(instance_id);
        if let Some(instance) = removed {
            let _ = instance.shutdown_tx.send(());
            info!(
                instance_id = %instance_id,
                service_name = %service_name,
                "Deregistered service instance"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceDiscovery for InMemoryRegistry {
    async fn resolve(&self, service_name: &str, tag: &str) -> Result<Vec<ServiceEndpoint>> {
        let state = self.state.read();
        let mut endpoints: Vec<ServiceEndpoint> = state
            .instances
            .values()
            .filter(|i| i.status == CheckStatus::Passing)
            .filter(|i| i.registration.service_name == service_name)
            .filter(|i| i.registration.tags.iter().any(|t| t == tag))
            .map(|i| i.registration.endpoint())
            .collect();
        endpoints.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(endpoints)
    }
}

impl Drop for InMemoryRegistry {
    fn drop(&mut self) {
        for instance in self.state.read().instances.values() {
            let _ = instance.shutdown_tx.send(());
        }
    }
}
