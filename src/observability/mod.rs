//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every breaker transition and store failure is logged with the dependency name
//! - Request ID flows from the inbound request to the downstream call
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
