//! Discovery-backed RPC connections.
//!
//! A [`ServiceConnection`] keeps the healthy endpoint set of one logical
//! service up to date in the background and sends each call to the
//! endpoint chosen by its [`LoadBalancer`]. When an endpoint refuses the
//! connection the call moves on to an endpoint it has not tried yet.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use oa_common::{RequestContext, RpcFrame, RpcStatus, REQUEST_ID_HEADER, RPC_TAG, TIMEOUT_HEADER};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::balancer::{LoadBalancer, RoundRobin};
use crate::error::Result;
use crate::registry::{ServiceDiscovery, ServiceEndpoint};

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Only endpoints carrying this tag are used
    pub tag: String,
    /// Background re-resolution period
    pub refresh_interval: Duration,
    /// TCP connect timeout per attempt
    pub connect_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tag: RPC_TAG.to_string(),
            refresh_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl ResolverConfig {
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

pub struct ServiceResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    config: ResolverConfig,
}

impl ServiceResolver {
    pub fn new(discovery: Arc<dyn ServiceDiscovery>, config: ResolverConfig) -> Self {
        Self { discovery, config }
    }

    /// Connect to `service_name` with round-robin balancing.
    pub async fn connect(&self, service_name: &str) -> Result<ServiceConnection> {
        self.connect_with(service_name, Arc::new(RoundRobin::new()))
            .await
    }

    /// Connect with an explicit balancing policy. An empty initial
    /// resolution is not an error; calls resolve again on demand.
    pub async fn connect_with(
        &self,
        service_name: &str,
        balancer: Arc<dyn LoadBalancer>,
    ) -> Result<ServiceConnection> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .build()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let inner = Arc::new(ConnectionInner {
            service_name: service_name.to_string(),
            tag: self.config.tag.clone(),
            discovery: self.discovery.clone(),
            balancer,
            client,
            endpoints: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            shutdown_tx,
        });

        if let Err(e) = inner.refresh().await {
            warn!(service_name = %service_name, error = %e, "Initial resolution failed");
        }

        info!(
            service_name = %service_name,
            policy = inner.balancer.name(),
            endpoints = inner.endpoints.read().len(),
            "Connected to service"
        );

        spawn_refresh_loop(
            Arc::downgrade(&inner),
            self.config.refresh_interval,
            shutdown_rx,
        );

        Ok(ServiceConnection { inner })
    }
}

struct ConnectionInner {
    service_name: String,
    tag: String,
    discovery: Arc<dyn ServiceDiscovery>,
    balancer: Arc<dyn LoadBalancer>,
    client: reqwest::Client,
    endpoints: RwLock<Vec<ServiceEndpoint>>,
    closed: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl ConnectionInner {
    async fn refresh(&self) -> Result<()> {
        let resolved = self.discovery.resolve(&self.service_name, &self.tag).await?;
        let mut endpoints = self.endpoints.write();
        if *endpoints != resolved {
            info!(
                service_name = %self.service_name,
                before = endpoints.len(),
                after = resolved.len(),
                "Endpoint set changed"
            );
            *endpoints = resolved;
        }
        Ok(())
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn spawn_refresh_loop(
    inner: Weak<ConnectionInner>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    if let Err(e) = inner.refresh().await {
                        warn!(service_name = %inner.service_name, error = %e, "Endpoint refresh failed");
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    });
}

/// Outcome of one attempt against one endpoint.
enum AttemptError {
    /// The endpoint could not be reached; another endpoint may be tried.
    Unreachable(reqwest::Error),
    /// Final outcome for this call.
    Failed(RpcStatus),
}

/// Long-lived, cloneable handle safe for concurrent use.
#[derive(Clone)]
pub struct ServiceConnection {
    inner: Arc<ConnectionInner>,
}

impl ServiceConnection {
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Current endpoint snapshot.
    pub fn endpoints(&self) -> Vec<ServiceEndpoint> {
        self.inner.endpoints.read().clone()
    }

    /// Re-resolve now instead of waiting for the next refresh tick.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// Stop background refresh and reject further calls.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.shutdown_tx.send(());
            info!(service_name = %self.inner.service_name, "Connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Invoke `method` (e.g. `/auth.v1.AuthService/SignIn`).
    pub async fn call<Req, Resp>(
        &self,
        ctx: &RequestContext,
        method: &str,
        request: &Req,
    ) -> std::result::Result<Resp, RpcStatus>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        if self.is_closed() {
            return Err(RpcStatus::unavailable("connection closed"));
        }
        ctx.check().map_err(|_| RpcStatus::deadline_exceeded())?;

        let mut endpoints = self.endpoints();
        if endpoints.is_empty() {
            match ctx.run(self.inner.refresh()).await {
                Err(_) => return Err(RpcStatus::deadline_exceeded()),
                Ok(Err(e)) => {
                    warn!(service_name = %self.inner.service_name, error = %e, "On-demand resolution failed");
                }
                Ok(Ok(())) => {}
            }
            endpoints = self.endpoints();
        }
        if endpoints.is_empty() {
            ctx.check().map_err(|_| RpcStatus::deadline_exceeded())?;
            return Err(RpcStatus::unavailable(format!(
                "no healthy instances of {}",
                self.inner.service_name
            )));
        }

        let mut tried: HashSet<String> = HashSet::new();
        while tried.len() < endpoints.len() {
            let remaining: Vec<ServiceEndpoint> = endpoints
                .iter()
                .filter(|e| !tried.contains(&e.instance_id))
                .cloned()
                .collect();
            let Some(endpoint) = self.inner.balancer.pick(&remaining) else {
                break;
            };
            tried.insert(endpoint.instance_id.clone());

            match self.attempt(ctx, endpoint, method, request).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Failed(status)) => return Err(status),
                Err(AttemptError::Unreachable(e)) => {
                    warn!(
                        service_name = %self.inner.service_name,
                        instance_id = %endpoint.instance_id,
                        error = %e,
                        "Instance unreachable, trying another"
                    );
                }
            }
        }

        Err(RpcStatus::unavailable(format!(
            "no reachable instance of {}",
            self.inner.service_name
        )))
    }

    async fn attempt<Req, Resp>(
        &self,
        ctx: &RequestContext,
        endpoint: &ServiceEndpoint,
        method: &str,
        request: &Req,
    ) -> std::result::Result<Resp, AttemptError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let mut builder = self
            .inner
            .client
            .post(format!("{}{}", endpoint.base_url(), method))
            .header(REQUEST_ID_HEADER, ctx.request_id())
            .json(request);

        if let Some(remaining) = ctx.remaining() {
            if remaining.is_zero() {
                return Err(AttemptError::Failed(RpcStatus::deadline_exceeded()));
            }
            builder = builder
                .header(TIMEOUT_HEADER, remaining.as_millis().to_string())
                .timeout(remaining);
        }

        debug!(instance_id = %endpoint.instance_id, method = %method, "Sending RPC");

        let response = match ctx.run(builder.send()).await {
            Err(_) => return Err(AttemptError::Failed(RpcStatus::deadline_exceeded())),
            Ok(Err(e)) if e.is_timeout() => {
                return Err(AttemptError::Failed(RpcStatus::deadline_exceeded()))
            }
            Ok(Err(e)) if e.is_connect() => return Err(AttemptError::Unreachable(e)),
            Ok(Err(e)) => {
                return Err(AttemptError::Failed(RpcStatus::unavailable(format!(
                    "transport error: {}",
                    e
                ))))
            }
            Ok(Ok(response)) => response,
        };

        let http_status = response.status();
        match ctx.run(response.json::<RpcFrame<Resp>>()).await {
            Err(_) => Err(AttemptError::Failed(RpcStatus::deadline_exceeded())),
            Ok(Ok(frame)) => {
                let result: std::result::Result<Resp, RpcStatus> = frame.into();
                result.map_err(AttemptError::Failed)
            }
            Ok(Err(e)) if e.is_timeout() => {
                Err(AttemptError::Failed(RpcStatus::deadline_exceeded()))
            }
            Ok(Err(_)) if http_status.is_success() => Err(AttemptError::Failed(
                RpcStatus::internal("malformed reply from instance"),
            )),
            Ok(Err(_)) => Err(AttemptError::Failed(RpcStatus::unavailable(format!(
                "instance replied with HTTP {}",
                http_status
            )))),
        }
    }
}
