//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt against a dependency:
//!     → registry.rs (one breaker per dependency name)
//!     → circuit_breaker.rs (admit / reject, probe budget)
//!     → [downstream call, outside any lock]
//!     → classifier.rs (success / failure)
//!     → circuit_breaker.rs (record outcome, maybe transition)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; a timeout is a failure
//! - No retries: a failed attempt is recorded once and reported
//! - Breakers are local and authoritative for this process

pub mod circuit_breaker;
pub mod classifier;
pub mod registry;

pub use circuit_breaker::{
    Admission, BreakerSettings, BreakerSnapshot, BreakerState, CircuitBreaker, Rejection,
    Transition, WindowCounts,
};
pub use classifier::{classify, FailureReason, Outcome};
pub use registry::{BreakerRegistry, Dependency};
