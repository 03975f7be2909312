//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend application server
//! - Pre-compute the forwarding and liveness URIs
//! - Carry the weight used by weighted strategies

use axum::http::Uri;
use url::Url;

use crate::config::BackendConfig;
use crate::load_balancer::pool::PoolError;

/// Path every backend serves forwarded work on.
pub const PROCESS_PATH: &str = "/process";

/// A single backend server. Immutable once the pool is loaded.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Unique, stable identifier; prefixes every metrics key.
    pub name: String,
    /// Address as configured (host or host:port).
    pub address: String,
    /// Weight on a 1-10 scale.
    pub weight: f64,
    /// Pre-calculated base URL.
    pub base_url: Url,
    forward_uri: Uri,
    ping_uri: Uri,
}

impl Backend {
    /// Build a backend from config, appending `default_port` when the
    /// address does not name one.
    pub fn from_config(config: &BackendConfig, default_port: u16) -> Result<Self, PoolError> {
        let address = config.address.trim();
        let authority = if has_port(address) {
            address.to_string()
        } else {
            format!("{}:{}", address, default_port)
        };

        let invalid = |reason: String| PoolError::InvalidAddress {
            name: config.name.clone(),
            reason,
        };

        let base_url =
            Url::parse(&format!("http://{}", authority)).map_err(|e| invalid(e.to_string()))?;
        if base_url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        let forward_url = base_url
            .join(PROCESS_PATH)
            .map_err(|e| invalid(e.to_string()))?;
        let forward_uri = forward_url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
        let ping_uri = base_url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            address: address.to_string(),
            weight: config.weight,
            base_url,
            forward_uri,
            ping_uri,
        })
    }

    /// `http://<host>:<port>/process`
    pub fn forward_uri(&self) -> &Uri {
        &self.forward_uri
    }

    /// `http://<host>:<port>/`
    pub fn ping_uri(&self) -> &Uri {
        &self.ping_uri
    }

    /// Weight clamped to a usable positive value.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() && self.weight > 0.0 {
            self.weight
        } else {
            1.0
        }
    }
}

fn has_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        // "[::1]" style literals end in ']' when no port follows
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
