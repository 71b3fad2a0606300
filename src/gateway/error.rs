//! Gateway error taxonomy.

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::{FailureReason, Rejection};

/// Which layer short-circuited a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedBy {
    /// The shared flag was readable and open.
    SharedFlag,
    /// The local breaker refused admission.
    LocalBreaker(Rejection),
}

impl RejectedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectedBy::SharedFlag => "shared",
            RejectedBy::LocalBreaker(_) => "local",
        }
    }
}

impl fmt::Display for RejectedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectedBy::SharedFlag => f.write_str("shared circuit flag"),
            RejectedBy::LocalBreaker(rejection) => write!(f, "local {}", rejection),
        }
    }
}

/// Errors surfaced by a protected call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// Blocked without trying.
    #[error("{name} is unavailable (circuit open)")]
    CircuitOpen { name: String, rejected_by: RejectedBy },

    /// Tried and failed.
    #[error("{name} is unavailable")]
    DependencyFailure { name: String, reason: FailureReason },

    /// Answered, but the body was too large to relay.
    #[error("{name} response exceeds {limit} bytes")]
    ResponseTooLarge { name: String, limit: usize },

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownDependency(_) => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen { .. } | GatewayError::DependencyFailure { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::ResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
