//! Random load balancing strategy.
//!
//! Draws from `[0, 100)` and reduces modulo the pool size. When the pool
//! size does not divide 100 the lowest `100 % N` indices are favoured
//! slightly; this matches the behaviour existing deployments were tuned on.

use rand::Rng;

use crate::load_balancer::pool::ServerPool;

/// Exclusive upper bound of each draw.
pub const DRAW_RANGE: u32 = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }

    pub fn pick(&self, pool: &ServerPool) -> usize {
        let draw = rand::thread_rng().gen_range(0..DRAW_RANGE);
        index_for_draw(draw, pool.len())
    }
}

/// Map a draw in `[0, 100)` onto a pool of `len` backends.
pub fn index_for_draw(draw: u32, len: usize) -> usize {
    draw as usize % len
}
