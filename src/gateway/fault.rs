//! Fault injection.
//!
//! A [`FaultInjector`] decides, call by call, whether to fail according to a
//! [`FaultPlan`] that can be swapped at runtime. It drives the `flaky-backend`
//! stand-in and [`FaultyDownstream`], which wraps any real downstream.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use parking_lot::RwLock;
use thiserror::Error;

use crate::gateway::downstream::{
    Downstream, DownstreamRequest, DownstreamResponse, TransportError,
};

/// When to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPlan {
    Healthy,
    Failing,
    /// Fail every n-th call (1-based).
    EveryNth(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid fault plan '{0}', expected healthy | failing | every=N")]
pub struct FaultPlanParseError(String);

impl FromStr for FaultPlan {
    type Err = FaultPlanParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "healthy" => Ok(FaultPlan::Healthy),
            "failing" => Ok(FaultPlan::Failing),
            other => other
                .strip_prefix("every=")
                .and_then(|n| n.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(FaultPlan::EveryNth)
                .ok_or_else(|| FaultPlanParseError(s.to_string())),
        }
    }
}

impl fmt::Display for FaultPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultPlan::Healthy => f.write_str("healthy"),
            FaultPlan::Failing => f.write_str("failing"),
            FaultPlan::EveryNth(n) => write!(f, "every={}", n),
        }
    }
}

/// Thread-safe, runtime-switchable fault decision.
#[derive(Debug)]
pub struct FaultInjector {
    plan: RwLock<FaultPlan>,
    calls: AtomicU64,
}

impl FaultInjector {
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            plan: RwLock::new(plan),
            calls: AtomicU64::new(0),
        }
    }

    pub fn plan(&self) -> FaultPlan {
        *self.plan.read()
    }

    /// Replace the plan and restart the call count.
    pub fn set_plan(&self, plan: FaultPlan) {
        *self.plan.write() = plan;
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Count a call and report whether it should fail.
    pub fn should_fail(&self) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.plan() {
            FaultPlan::Healthy => false,
            FaultPlan::Failing => true,
            FaultPlan::EveryNth(n) => call % n == 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Shape of an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Answer 500 without calling the inner downstream.
    ServerError,
    /// Fail as if the connection was refused.
    ConnectionRefused,
    /// Hang for the given time, then fail as a timeout.
    Timeout(Duration),
}

/// Downstream decorator that fails calls according to an injector.
pub struct FaultyDownstream<D> {
    inner: D,
    injector: Arc<FaultInjector>,
    fault: InjectedFault,
}

impl<D> FaultyDownstream<D> {
    pub fn new(inner: D, injector: Arc<FaultInjector>, fault: InjectedFault) -> Self {
        Self {
            inner,
            injector,
            fault,
        }
    }
}

#[async_trait]
impl<D: Downstream> Downstream for FaultyDownstream<D> {
    async fn call(&self, request: DownstreamRequest) -> Result<DownstreamResponse, TransportError> {
        if !self.injector.should_fail() {
            return self.inner.call(request).await;
        }
        tracing::debug!(url = %request.target, fault = ?self.fault, "Injecting fault");
        match self.fault {
            InjectedFault::ServerError => Ok(DownstreamResponse::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "injected fault",
            )),
            InjectedFault::ConnectionRefused => {
                Err(TransportError::Connect("injected: connection refused".into()))
            }
            InjectedFault::Timeout(after) => {
                tokio::time::sleep(after).await;
                Err(TransportError::Timeout(after))
            }
        }
    }
}
