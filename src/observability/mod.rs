//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing events with structured fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID from `x-request-id` is attached to dispatch log events
//! - Metrics are cheap; recording before installation is a no-op
//! - The `/stats` route reads the metrics store, not this module

pub mod logging;
pub mod metrics;
