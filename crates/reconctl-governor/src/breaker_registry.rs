//! Keyed map of per-target [`CircuitBreaker`]s, populated lazily.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for `target_key` (a host or host-group).
    /// Updates never block the whole pool: each key has its own lock-free
    /// handle once retrieved, and the registry lock is only held briefly to
    /// look up or insert the `Arc`.
    pub fn get_or_create(&self, target_key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().unwrap().get(target_key) {
            return existing.clone();
        }
        let mut write_guard = self.breakers.write().unwrap();
        write_guard
            .entry(target_key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::Admission;

    #[test]
    fn same_key_returns_shared_breaker_instance() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        let a = registry.get_or_create("a.example.com");
        a.record_failure();
        let b = registry.get_or_create("a.example.com");
        assert_eq!(b.admit(), Admission::Allowed);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_get_independent_breakers() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig {
            threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        let a = registry.get_or_create("a.example.com");
        let b = registry.get_or_create("b.example.com");
        a.record_failure();
        assert_eq!(a.state_kind(), crate::circuit_breaker::BreakerStateKind::Open);
        assert_eq!(b.state_kind(), crate::circuit_breaker::BreakerStateKind::Closed);
    }
}
