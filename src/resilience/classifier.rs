//! Outcome classification for downstream call attempts.
//!
//! - Transport errors (refused, DNS, timeout, truncated body) are failures
//! - 5xx responses are failures
//! - Everything else, 4xx included, is a success: the dependency answered
//! - An oversized body is judged by its status alone

use axum::http::StatusCode;
use thiserror::Error;

use crate::gateway::downstream::{DownstreamResponse, TransportError};

/// Binary result of one attempt as seen by the breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

/// Why an attempt counted as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out")]
    Timeout,

    #[error("server error status {0}")]
    ServerError(u16),
}

impl From<&TransportError> for FailureReason {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => FailureReason::Timeout,
            other => FailureReason::Transport(other.to_string()),
        }
    }
}

/// Classify a response status.
pub fn classify_status(status: StatusCode) -> Outcome {
    if status.is_server_error() {
        Outcome::Failure(FailureReason::ServerError(status.as_u16()))
    } else {
        Outcome::Success
    }
}

/// Classify the result of a downstream call attempt.
pub fn classify(result: &Result<DownstreamResponse, TransportError>) -> Outcome {
    match result {
        Ok(response) => classify_status(response.status),
        Err(TransportError::BodyTooLarge { status, .. }) => classify_status(*status),
        Err(err) => Outcome::Failure(FailureReason::from(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn response(status: u16) -> Result<DownstreamResponse, TransportError> {
        Ok(DownstreamResponse::text(
            StatusCode::from_u16(status).unwrap(),
            "body",
        ))
    }

    #[test]
    fn test_success_statuses() {
        assert_eq!(classify(&response(200)), Outcome::Success);
        assert_eq!(classify(&response(204)), Outcome::Success);
        assert_eq!(classify(&response(301)), Outcome::Success);
    }

    #[test]
    fn test_client_errors_are_not_failures() {
        assert_eq!(classify(&response(404)), Outcome::Success);
        assert_eq!(classify(&response(429)), Outcome::Success);
    }

    #[test]
    fn test_server_errors_are_failures() {
        assert_eq!(
            classify(&response(500)),
            Outcome::Failure(FailureReason::ServerError(500))
        );
        assert!(classify(&response(503)).is_failure());
        assert!(classify(&response(599)).is_failure());
    }

    #[test]
    fn test_transport_errors_are_failures() {
        let refused = Err(TransportError::Connect("connection refused".into()));
        assert!(matches!(
            classify(&refused),
            Outcome::Failure(FailureReason::Transport(msg)) if msg.contains("connection refused")
        ));

        let timeout = Err(TransportError::Timeout(Duration::from_millis(50)));
        assert_eq!(classify(&timeout), Outcome::Failure(FailureReason::Timeout));
    }

    #[test]
    fn test_oversized_body_classified_by_status() {
        let large_ok = Err(TransportError::BodyTooLarge {
            status: StatusCode::OK,
            limit: 1024,
        });
        assert_eq!(classify(&large_ok), Outcome::Success);

        let large_error = Err(TransportError::BodyTooLarge {
            status: StatusCode::BAD_GATEWAY,
            limit: 1024,
        });
        assert_eq!(
            classify(&large_error),
            Outcome::Failure(FailureReason::ServerError(502))
        );
    }
}
