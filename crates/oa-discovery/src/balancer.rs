//! Load-balancing policies over a resolved endpoint set.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::registry::ServiceEndpoint;

/// Chooses the endpoint for the next attempt.
pub trait LoadBalancer: Send + Sync {
    fn name(&self) -> &'static str;

    fn pick<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint>;
}

/// Cycles through endpoints in order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn pick<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint> {
        if endpoints.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % endpoints.len();
        endpoints.get(index)
    }
}

/// Always the first endpoint; later ones are only reached by retry.
#[derive(Debug, Default)]
pub struct PickFirst;

impl LoadBalancer for PickFirst {
    fn name(&self) -> &'static str {
        "pick_first"
    }

    fn pick<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint> {
        endpoints.first()
    }
}
