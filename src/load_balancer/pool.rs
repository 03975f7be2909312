//! Backend pool.
//!
//! # Responsibilities
//! - Resolve the configured backends into an ordered, index-addressable set
//! - Reject an empty pool (fatal misconfiguration)
//! - Carry the configured strategy name

use crate::config::PoolConfig;
use crate::load_balancer::backend::Backend;

/// Error building the pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("backend pool is empty")]
    Empty,
    #[error("backend '{name}' has an invalid address: {reason}")]
    InvalidAddress { name: String, reason: String },
}

/// The resolved set of backends plus the configured strategy name.
///
/// Created once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ServerPool {
    backends: Vec<Backend>,
    strategy_name: String,
}

impl ServerPool {
    /// Build a pool from configuration.
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let backends = config
            .backends
            .iter()
            .map(|b| Backend::from_config(b, config.communication_port))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(backends, config.algorithm.clone())
    }

    /// Build a pool from already-resolved backends.
    pub fn new(backends: Vec<Backend>, strategy_name: impl Into<String>) -> Result<Self, PoolError> {
        if backends.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(Self {
            backends,
            strategy_name: strategy_name.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Backend> {
        self.backends.get(index)
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_empty_pool_rejected() {
        let config = PoolConfig::default();
        assert!(matches!(ServerPool::from_config(&config), Err(PoolError::Empty)));
    }

    #[test]
    fn test_pool_preserves_order() {
        let mut config = PoolConfig::default();
        for name in ["server1", "server2", "server3"] {
            config.backends.push(BackendConfig {
                name: name.into(),
                address: "10.0.0.1".into(),
                weight: 1.0,
            });
        }
        let pool = ServerPool::from_config(&config).unwrap();
        let names: Vec<_> = pool.backends().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["server1", "server2", "server3"]);
        assert_eq!(pool.strategy_name(), "round robin");
    }
}
