//! Response mapping.
//!
//! - Successful calls return the dependency's status, content type and body
//! - Blocked and failed calls both return 503, with distinct messages
//! - Rejections carry `x-circuit-rejected-by: shared | local`

use axum::{
    body::Body,
    http::{header, HeaderValue, Response as HttpResponse},
    response::{IntoResponse, Response},
};

use crate::gateway::{DownstreamResponse, GatewayError};

pub const X_CIRCUIT_REJECTED_BY: &str = "x-circuit-rejected-by";

impl IntoResponse for DownstreamResponse {
    fn into_response(self) -> Response {
        let mut response = HttpResponse::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if let GatewayError::CircuitOpen { rejected_by, .. } = &self {
            response.headers_mut().insert(
                X_CIRCUIT_REJECTED_BY,
                HeaderValue::from_static(rejected_by.as_str()),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RejectedBy;
    use crate::resilience::Rejection;
    use axum::http::StatusCode;

    #[test]
    fn test_rejection_header() {
        let response = GatewayError::CircuitOpen {
            name: "ServiceB".into(),
            rejected_by: RejectedBy::LocalBreaker(Rejection::ProbeBudgetExhausted),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[X_CIRCUIT_REJECTED_BY], "local");
    }

    #[test]
    fn test_downstream_status_preserved() {
        let response = DownstreamResponse::text(StatusCode::NOT_FOUND, "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(header::CONTENT_TYPE));
    }
}
