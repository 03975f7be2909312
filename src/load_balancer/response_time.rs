//! Least response time load balancing strategy.

use std::cmp::Ordering;

use crate::load_balancer::least_conn::load_at;
use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::BackendLoad;

/// Selects the backend with the lowest rolling average response time.
/// Backends with no samples average 0 and are tried first.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastResponseTime;

impl LeastResponseTime {
    pub fn new() -> Self {
        Self
    }

    pub fn pick(&self, pool: &ServerPool, loads: &[BackendLoad]) -> usize {
        (0..pool.len())
            .min_by(|&a, &b| {
                let a = load_at(loads, a).avg_response_ms;
                let b = load_at(loads, b).avg_response_ms;
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            })
            .unwrap_or(0)
    }
}
