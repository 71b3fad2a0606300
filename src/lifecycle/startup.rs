//! Startup orchestration.
//!
//! # Responsibilities
//! - Choose the shared flag store (Redis, or in-process when disabled)
//! - Build the downstream client and breaker registry from config
//! - Assemble the call gateway
//!
//! # Design Decisions
//! - Fail fast on bad config (an unparsable store URL)
//! - No Redis round trip here; the store connects lazily

use std::sync::Arc;

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::gateway::{CallGateway, Downstream, HttpDownstream};
use crate::resilience::BreakerRegistry;
use crate::store::{FlagStore, MemoryFlagStore, RedisFlagStore, SharedFlags, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("shared store: {0}")]
    SharedStore(#[from] StoreError),
}

/// Pick the flag store the config asks for.
pub fn build_flag_store(config: &GatewayConfig) -> Result<Arc<dyn FlagStore>, StartupError> {
    if config.shared_store.enabled {
        tracing::info!(url = %config.shared_store.url, "Using Redis shared flag store");
        Ok(Arc::new(RedisFlagStore::new(&config.shared_store)?))
    } else {
        tracing::warn!("Shared store disabled; circuit flags are local to this instance");
        Ok(Arc::new(MemoryFlagStore::new()))
    }
}

/// Build a gateway over a given store and downstream.
pub fn assemble_gateway(
    config: &GatewayConfig,
    store: Arc<dyn FlagStore>,
    downstream: Arc<dyn Downstream>,
) -> CallGateway {
    let registry = BreakerRegistry::from_config(config);
    for dependency in registry.iter() {
        let settings = dependency.breaker().settings();
        tracing::info!(
            dependency = %dependency.name(),
            url = %dependency.target(),
            min_requests = settings.min_requests,
            failure_ratio_threshold = settings.failure_ratio_threshold,
            open_cooldown = ?settings.open_cooldown,
            "Registered dependency"
        );
    }

    CallGateway::new(
        registry,
        SharedFlags::new(store),
        downstream,
        config.shared_store.lease(),
    )
}

/// Build the production gateway from config.
pub fn build_gateway(config: &GatewayConfig) -> Result<CallGateway, StartupError> {
    let store = build_flag_store(config)?;
    let downstream: Arc<dyn Downstream> = Arc::new(HttpDownstream::new(&config.downstream));
    Ok(assemble_gateway(config, store, downstream))
}
