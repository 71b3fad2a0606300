//! Call gateway: the protected-call pipeline.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → shared flag read          (open & known → 503, no call)
//!     → local breaker admission   (open / probes exhausted → 503, no call)
//!     → downstream call           (spawned; survives client cancellation)
//!     → classify → record outcome (may transition)
//!     → landed in open → set_open(lease); half-open → closed → clear_open
//!     → response
//! ```
//!
//! # Design Decisions
//! - Local state is updated before the shared store is touched
//! - The breaker lock is held only for admission and recording
//! - Store writes are awaited but bounded and their errors swallowed

pub mod downstream;
pub mod error;
pub mod fault;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::observability::metrics;
use crate::resilience::{
    classify, Admission, BreakerRegistry, BreakerSnapshot, Dependency, Outcome, Transition,
};
use crate::store::{FlagRead, SharedFlags};

pub use downstream::{Downstream, DownstreamRequest, DownstreamResponse, HttpDownstream, TransportError};
pub use error::{GatewayError, RejectedBy};

/// Per-dependency status for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    pub name: String,
    pub target: String,
    pub breaker: BreakerSnapshot,
    pub shared_flag: FlagRead,
}

struct GatewayInner {
    registry: BreakerRegistry,
    flags: SharedFlags,
    downstream: Arc<dyn Downstream>,
    lease: Duration,
}

/// Orchestrates protected calls. Cheap to clone.
#[derive(Clone)]
pub struct CallGateway {
    inner: Arc<GatewayInner>,
}

impl CallGateway {
    pub fn new(
        registry: BreakerRegistry,
        flags: SharedFlags,
        downstream: Arc<dyn Downstream>,
        lease: Duration,
    ) -> Self {
        let now = Instant::now();
        for dependency in registry.iter() {
            let (snapshot, _) = dependency.breaker().snapshot(now);
            metrics::record_breaker_state(dependency.name(), snapshot.state);
        }
        Self {
            inner: Arc::new(GatewayInner {
                registry,
                flags,
                downstream,
                lease,
            }),
        }
    }

    pub fn registry(&self) -> &BreakerRegistry {
        &self.inner.registry
    }

    /// Perform one protected call to `name`.
    pub async fn call(
        &self,
        name: &str,
        request_id: Option<String>,
    ) -> Result<DownstreamResponse, GatewayError> {
        let dependency = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| GatewayError::UnknownDependency(name.to_string()))?;

        // 1. Shared flag fast path
        let flag = self.inner.flags.read_flag(name).await;
        if flag.blocks() {
            tracing::debug!(dependency = %name, "Rejected by shared circuit flag");
            metrics::record_call(name, "rejected_shared");
            return Err(GatewayError::CircuitOpen {
                name: name.to_string(),
                rejected_by: RejectedBy::SharedFlag,
            });
        }

        // 2. Local breaker
        let admission = match dependency.breaker().try_acquire(Instant::now()) {
            Ok(admission) => admission,
            Err(rejection) => {
                tracing::debug!(dependency = %name, reason = %rejection, "Rejected by local breaker");
                metrics::record_call(name, "rejected_local");
                return Err(GatewayError::CircuitOpen {
                    name: name.to_string(),
                    rejected_by: RejectedBy::LocalBreaker(rejection),
                });
            }
        };
        if let Some(transition) = admission.transition() {
            observe_transition(name, transition);
        }

        // 3-5. Attempt on its own task so caller cancellation cannot skip accounting
        let gateway = self.clone();
        let attempt = tokio::spawn(async move {
            gateway.attempt(dependency, admission, request_id).await
        });

        attempt
            .await
            .map_err(|e| GatewayError::Internal(format!("attempt task failed: {}", e)))?
    }

    async fn attempt(
        &self,
        dependency: Arc<Dependency>,
        admission: Admission,
        request_id: Option<String>,
    ) -> Result<DownstreamResponse, GatewayError> {
        let name = dependency.name();
        let request = DownstreamRequest::get(dependency.target()).with_request_id(request_id);

        let started = Instant::now();
        let result = self.inner.downstream.call(request).await;
        metrics::record_downstream_latency(name, started);

        let outcome = classify(&result);
        let transition = dependency
            .breaker()
            .record(admission, &outcome, Instant::now());

        if let Some(transition) = transition {
            observe_transition(name, transition);
            if transition.opened() {
                self.inner.flags.set_open(name, self.inner.lease).await;
            } else if transition.recovered() {
                self.inner.flags.clear_open(name).await;
            }
        }

        match outcome {
            Outcome::Success => {
                metrics::record_call(name, "success");
                result.map_err(|e| match e {
                    TransportError::BodyTooLarge { limit, .. } => GatewayError::ResponseTooLarge {
                        name: name.to_string(),
                        limit,
                    },
                    other => GatewayError::DependencyFailure {
                        name: name.to_string(),
                        reason: (&other).into(),
                    },
                })
            }
            Outcome::Failure(reason) => {
                tracing::warn!(
                    dependency = %name,
                    probe = admission.is_probe(),
                    reason = %reason,
                    "Dependency call failed"
                );
                metrics::record_call(name, "failure");
                Err(GatewayError::DependencyFailure {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Snapshot every dependency, including its shared flag.
    pub async fn status(&self) -> Vec<DependencyStatus> {
        let now = Instant::now();
        let mut statuses = Vec::with_capacity(self.inner.registry.len());
        for dependency in self.inner.registry.iter() {
            let (breaker, transition) = dependency.breaker().snapshot(now);
            if let Some(transition) = transition {
                observe_transition(dependency.name(), transition);
            }
            statuses.push(DependencyStatus {
                name: dependency.name().to_string(),
                target: dependency.target().to_string(),
                breaker,
                shared_flag: self.inner.flags.read_flag(dependency.name()).await,
            });
        }
        statuses
    }
}

fn observe_transition(name: &str, transition: Transition) {
    if transition.opened() {
        tracing::warn!(dependency = %name, from = %transition.from, to = %transition.to, "Circuit breaker opened");
    } else {
        tracing::info!(dependency = %name, from = %transition.from, to = %transition.to, "Circuit breaker state changed");
    }
    metrics::record_transition(name, transition.to);
    metrics::record_breaker_state(name, transition.to);
}
