//! Registry of protected dependencies.
//!
//! Built once at startup from configuration and shared by handle; holds
//! exactly one breaker per dependency name for the life of the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};

/// A named dependency with its target and breaker.
#[derive(Debug)]
pub struct Dependency {
    target: String,
    breaker: CircuitBreaker,
}

impl Dependency {
    pub fn new(name: impl Into<String>, target: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            target: target.into(),
            breaker: CircuitBreaker::new(name, settings),
        }
    }

    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// Immutable name → dependency mapping.
#[derive(Debug, Default, Clone)]
pub struct BreakerRegistry {
    dependencies: BTreeMap<String, Arc<Dependency>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        config
            .dependencies
            .iter()
            .fold(Self::new(), |registry, dependency| {
                let settings = BreakerSettings::from(config.breaker_for(dependency));
                registry.with(Dependency::new(&dependency.name, &dependency.target, settings))
            })
    }

    /// Add a dependency, replacing any with the same name.
    pub fn with(mut self, dependency: Dependency) -> Self {
        self.dependencies
            .insert(dependency.name().to_string(), Arc::new(dependency));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dependency>> {
        self.dependencies.get(name).cloned()
    }

    /// Dependencies in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Dependency>> {
        self.dependencies.values()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
