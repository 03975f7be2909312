//! Least Connections load balancing strategies.

use std::cmp::Ordering;

use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::BackendLoad;

/// Least connections selector.
/// Selects the backend with the minimum active-connection gauge.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }

    pub fn pick(&self, pool: &ServerPool, loads: &[BackendLoad]) -> usize {
        // In case of tie, the first one is selected (stability)
        (0..pool.len())
            .min_by_key(|&i| load_at(loads, i).active_connections)
            .unwrap_or(0)
    }
}

/// Weighted least connections selector.
/// Selects the backend with the minimum `active_connections / weight`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedLeastConnections;

impl WeightedLeastConnections {
    pub fn new() -> Self {
        Self
    }

    pub fn pick(&self, pool: &ServerPool, loads: &[BackendLoad]) -> usize {
        let score = |i: usize| {
            let weight = pool.get(i).map(|b| b.effective_weight()).unwrap_or(1.0);
            load_at(loads, i).active_connections as f64 / weight
        };

        (0..pool.len())
            .min_by(|&a, &b| score(a).partial_cmp(&score(b)).unwrap_or(Ordering::Equal))
            .unwrap_or(0)
    }
}

/// Missing entries read as an idle backend.
pub(crate) fn load_at(loads: &[BackendLoad], index: usize) -> BackendLoad {
    loads.get(index).copied().unwrap_or_default()
}
