//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs middleware (request ID, trace, body limit, rate limit)
//!     → GET /stats          → StatsAggregator snapshot
//!     → GET /health         → 200
//!     → GET /serversHealth  → one ping per backend
//!     → anything else       → intake queue → Dispatcher → backend
//! ```

pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
