//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher dequeues a request
//!     → (dynamic strategies only) read BackendLoad per backend from metrics
//!     → Strategy::select:
//!         - round_robin.rs (rotate, optionally weighted)
//!         - url_hash.rs (hash of request URL)
//!         - random.rs (draw in [0, 100))
//!         - least_conn.rs (fewest active connections, optionally weighted)
//!         - response_time.rs (lowest average response time)
//!     → index into pool.rs
//! ```
//!
//! # Design Decisions
//! - Closed set of strategies, one enum, exhaustively matched
//! - Unknown names fall back to round robin with a warning
//! - Strategies never touch the metrics store themselves; the dispatcher
//!   hands them a load view

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod response_time;
pub mod round_robin;
pub mod url_hash;

use self::least_conn::{LeastConnections, WeightedLeastConnections};
use self::pool::ServerPool;
use self::random::Random;
use self::response_time::LeastResponseTime;
use self::round_robin::{RoundRobin, WeightedRoundRobin};
use self::url_hash::UrlHash;

/// Selection failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no backends to select from")]
    EmptyPool,
}

/// Point-in-time load of one backend, read from the metrics store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackendLoad {
    pub active_connections: i64,
    pub avg_response_ms: f64,
}

/// What a strategy may look at when choosing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext<'a> {
    /// Request URL as received (path and query).
    pub url: &'a str,
    /// Load per backend, in pool order. Empty for static strategies.
    pub loads: &'a [BackendLoad],
}

/// The dispatch strategy for a pool.
#[derive(Debug)]
pub enum Strategy {
    RoundRobin(RoundRobin),
    WeightedRoundRobin(WeightedRoundRobin),
    UrlHash(UrlHash),
    Random(Random),
    LeastConnections(LeastConnections),
    WeightedLeastConnections(WeightedLeastConnections),
    LeastResponseTime(LeastResponseTime),
}

impl Strategy {
    /// Parse a configured algorithm name, case-insensitively.
    pub fn parse(name: &str, hash_seed: u64) -> Option<Self> {
        let strategy = match name.trim().to_lowercase().as_str() {
            "round robin" => Self::RoundRobin(RoundRobin::new()),
            "weighted round robin" => Self::WeightedRoundRobin(WeightedRoundRobin::new()),
            "url hash" => Self::UrlHash(UrlHash::new(hash_seed)),
            "random" => Self::Random(Random::new()),
            "least connections" => Self::LeastConnections(LeastConnections::new()),
            "weighted least connections" => {
                Self::WeightedLeastConnections(WeightedLeastConnections::new())
            }
            "least response time" => Self::LeastResponseTime(LeastResponseTime::new()),
            _ => return None,
        };
        Some(strategy)
    }

    /// Parse a configured algorithm name, falling back to round robin.
    pub fn from_name(name: &str, hash_seed: u64) -> Self {
        Self::parse(name, hash_seed).unwrap_or_else(|| {
            tracing::warn!(
                algorithm = %name,
                "Unknown load balancing algorithm, defaulting to round robin"
            );
            Self::RoundRobin(RoundRobin::new())
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundRobin(_) => "round robin",
            Self::WeightedRoundRobin(_) => "weighted round robin",
            Self::UrlHash(_) => "url hash",
            Self::Random(_) => "random",
            Self::LeastConnections(_) => "least connections",
            Self::WeightedLeastConnections(_) => "weighted least connections",
            Self::LeastResponseTime(_) => "least response time",
        }
    }

    /// Whether `select` reads `SelectionContext::loads`.
    pub fn needs_load(&self) -> bool {
        matches!(
            self,
            Self::LeastConnections(_) | Self::WeightedLeastConnections(_) | Self::LeastResponseTime(_)
        )
    }

    /// Pick a backend index for one request.
    pub fn select(&self, pool: &ServerPool, ctx: SelectionContext<'_>) -> Result<usize, SelectError> {
        if pool.is_empty() {
            return Err(SelectError::EmptyPool);
        }

        let index = match self {
            Self::RoundRobin(rr) => rr.pick(pool),
            Self::WeightedRoundRobin(wrr) => wrr.pick(pool),
            Self::UrlHash(uh) => uh.pick(ctx.url, pool),
            Self::Random(rnd) => rnd.pick(pool),
            Self::LeastConnections(lc) => lc.pick(pool, ctx.loads),
            Self::WeightedLeastConnections(wlc) => wlc.pick(pool, ctx.loads),
            Self::LeastResponseTime(lrt) => lrt.pick(pool, ctx.loads),
        };
        Ok(index)
    }
}
