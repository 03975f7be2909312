//! Round-robin load balancing strategies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::load_balancer::pool::ServerPool;

/// Round-robin selector.
///
/// The counter is incremented before it is used, so a fresh selector
/// starts at index 1 (mod N) and then cycles.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(&self, pool: &ServerPool) -> usize {
        let i = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        i % pool.len()
    }
}

/// Smooth weighted round-robin selector.
///
/// Every pick adds each backend's weight to its running score, takes the
/// highest score (first in pool order on ties) and subtracts the total
/// weight from the winner. Over `sum(weights)` picks each backend is chosen
/// in proportion to its weight, interleaved rather than in bursts.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    current: Mutex<Vec<f64>>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(&self, pool: &ServerPool) -> usize {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.len() != pool.len() {
            *current = vec![0.0; pool.len()];
        }

        let mut total = 0.0;
        let mut best = 0;
        for (i, backend) in pool.backends().iter().enumerate() {
            let weight = backend.effective_weight();
            current[i] += weight;
            total += weight;
            if current[i] > current[best] {
                best = i;
            }
        }

        current[best] -= total;
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::{pool_of, weighted_pool};

    #[test]
    fn test_round_robin_pre_increments() {
        let pool = pool_of(3);
        let rr = RoundRobin::new();

        let picks: Vec<usize> = (0..6).map(|_| rr.pick(&pool)).collect();
        assert_eq!(picks, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_round_robin_single_backend() {
        let pool = pool_of(1);
        let rr = RoundRobin::new();
        assert!((0..5).all(|_| rr.pick(&pool) == 0));
    }

    #[test]
    fn test_weighted_round_robin_proportions() {
        let pool = weighted_pool(&[5.0, 1.0, 1.0]);
        let wrr = WeightedRoundRobin::new();

        let picks: Vec<usize> = (0..7).map(|_| wrr.pick(&pool)).collect();
        assert_eq!(picks, vec![0, 0, 1, 0, 2, 0, 0]);

        let mut counts = [0; 3];
        for _ in 0..700 {
            counts[wrr.pick(&pool)] += 1;
        }
        assert_eq!(counts, [500, 100, 100]);
    }

    #[test]
    fn test_weighted_round_robin_equal_weights_cycle() {
        let pool = weighted_pool(&[1.0, 1.0]);
        let wrr = WeightedRoundRobin::new();
        let picks: Vec<usize> = (0..4).map(|_| wrr.pick(&pool)).collect();
        assert_eq!(picks, vec![0, 1, 0, 1]);
    }
}
