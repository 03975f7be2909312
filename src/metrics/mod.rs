//! Metrics store subsystem.
//!
//! # Data Flow
//! ```text
//! Write side:
//!     BackendClient → recorder.rs (activeConnections gauge around each call)
//!     Dispatcher    → recorder.rs (requestCount, responseTimes, proxyLatencies)
//!
//! Read side:
//!     /stats → stats.rs (scan names, read counters and lists, average)
//!     dynamic strategies → recorder.rs load_view
//!
//! Both sides → store.rs (MetricsStore trait)
//!     → memory.rs (in-process)
//!     → redis_store.rs (shared between proxy instances)
//! ```
//!
//! # Key Space
//! - `<name>:requestCount` monotonic counter
//! - `<name>:responseTimes` sample list, most recent first
//! - `<name>:activeConnections` signed gauge
//! - `proxyLatencies` sample list
//!
//! # Design Decisions
//! - Store built once at startup and injected; no global client
//! - Per-operation atomicity only, no cross-key locking
//! - Sample lists keep a fixed number of recent samples

pub mod memory;
pub mod recorder;
pub mod redis_store;
pub mod stats;
pub mod store;

use std::sync::Arc;

use crate::config::schema::{MetricsBackend, MetricsConfig};

pub use memory::MemoryStore;
pub use recorder::MetricsRecorder;
pub use stats::{BackendStats, StatsAggregator, StatsSnapshot};
pub use store::{MetricsStore, StoreError};

/// Build the configured store and make sure it answers.
pub async fn connect(config: &MetricsConfig) -> Result<Arc<dyn MetricsStore>, StoreError> {
    match config.backend {
        MetricsBackend::Memory => {
            tracing::info!(retention = config.sample_retention, "Using in-process metrics store");
            Ok(Arc::new(MemoryStore::new(config.sample_retention)))
        }
        MetricsBackend::Redis => Ok(Arc::new(redis_store::RedisStore::connect(config).await?)),
    }
}
