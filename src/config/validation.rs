//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics and reports every
//! problem found rather than stopping at the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{MetricsBackend, ProxyConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,
    #[error("backend #{0} has an empty name")]
    EmptyBackendName(usize),
    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),
    #[error("backend '{0}' has an empty address")]
    EmptyBackendAddress(String),
    #[error("backend '{name}' weight {weight} is outside 1-10")]
    WeightOutOfRange { name: String, weight: f64 },
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),
    #[error("intake capacity must be greater than zero")]
    ZeroIntakeCapacity,
    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("metrics sample retention must be greater than zero")]
    ZeroRetention,
    #[error("redis metrics backend selected without an address")]
    MissingRedisAddress,
    #[error("communication port must be greater than zero")]
    ZeroCommunicationPort,
    #[error("health check interval must be greater than zero")]
    ZeroHealthInterval,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.pool.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    if config.pool.communication_port == 0 {
        errors.push(ValidationError::ZeroCommunicationPort);
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.pool.backends.iter().enumerate() {
        if backend.name.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendName(i));
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.address.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendAddress(backend.name.clone()));
        }
        if !(1.0..=10.0).contains(&backend.weight) {
            errors.push(ValidationError::WeightOutOfRange {
                name: backend.name.clone(),
                weight: backend.weight,
            });
        }
    }

    if config.intake.capacity == 0 {
        errors.push(ValidationError::ZeroIntakeCapacity);
    }
    if config.timeouts.forward_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("forward_ms"));
    }
    if config.timeouts.ping_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("ping_ms"));
    }

    if config.metrics.op_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("metrics.op_timeout_ms"));
    }
    if config.metrics.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("metrics.connect_timeout_ms"));
    }
    if config.metrics.sample_retention == 0 {
        errors.push(ValidationError::ZeroRetention);
    }
    if config.metrics.backend == MetricsBackend::Redis
        && config.metrics.redis_address.trim().is_empty()
    {
        errors.push(ValidationError::MissingRedisAddress);
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn backend(name: &str, weight: f64) -> BackendConfig {
        BackendConfig {
            name: name.into(),
            address: "10.0.0.1".into(),
            weight,
        }
    }

    #[test]
    fn test_default_config_needs_backends() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.pool.backends = vec![backend("a", 1.0), backend("a", 11.0), backend("", 2.0)];
        config.intake.capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateBackend("a".into())));
        assert!(errors.contains(&ValidationError::EmptyBackendName(2)));
        assert!(errors.contains(&ValidationError::ZeroIntakeCapacity));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::WeightOutOfRange { .. })));
    }

    #[test]
    fn test_zero_store_timeouts_rejected() {
        let mut config = ProxyConfig::default();
        config.pool.backends = vec![backend("server1", 1.0)];
        config.metrics.op_timeout_ms = 0;
        config.metrics.connect_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroTimeout("metrics.op_timeout_ms"),
                ValidationError::ZeroTimeout("metrics.connect_timeout_ms"),
            ]
        );
    }

    #[test]
    fn test_valid_pool_passes() {
        let mut config = ProxyConfig::default();
        config.pool.backends = vec![backend("server1", 1.0), backend("server2", 10.0)];
        assert!(validate_config(&config).is_ok());
    }
}
