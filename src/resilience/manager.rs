//! # Circuit Breaker Manager
//!
//! Hands out one shared breaker per protected dependency so that every caller
//! targeting the same service observes the same failure history.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerState, CircuitState,
};

#[derive(Debug)]
pub struct CircuitBreakerManager {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    component_configs: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerManager {
    pub fn new(
        default_config: CircuitBreakerConfig,
        component_configs: HashMap<String, CircuitBreakerConfig>,
    ) -> Self {
        info!(
            default_failure_threshold = default_config.failure_threshold,
            component_overrides = component_configs.len(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: DashMap::new(),
            default_config,
            component_configs,
        }
    }

    /// Configuration a breaker for `component` would be created with
    pub fn config_for_component(&self, component: &str) -> CircuitBreakerConfig {
        self.component_configs
            .get(component)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    /// Get or create the breaker for a component
    pub fn get_circuit_breaker(&self, component: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.circuit_breakers.get(component) {
            return Arc::clone(existing.value());
        }

        let breaker = self
            .circuit_breakers
            .entry(component.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    component,
                    self.config_for_component(component),
                ))
            });

        Arc::clone(breaker.value())
    }

    pub fn get(&self, component: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuit_breakers
            .get(component)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn states(&self) -> Vec<CircuitBreakerState> {
        let mut states: Vec<CircuitBreakerState> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }

    pub fn all_metrics(&self) -> HashMap<String, CircuitBreakerMetrics> {
        self.circuit_breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }

    /// Names of breakers currently rejecting traffic
    pub fn open_components(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .circuit_breakers
            .iter()
            .filter(|entry| entry.value().state() != CircuitState::Closed)
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        open
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), HashMap::new())
    }
}
