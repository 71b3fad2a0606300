//! Outbound call to a protected dependency.
//!
//! # Responsibilities
//! - Issue one request per attempt (no retries; the breaker owns failure policy)
//! - Enforce connect and total-request deadlines
//! - Buffer the response body so the attempt is fully finished when it returns
//! - Report an oversized body with its status, so a healthy answer that is
//!   merely too large to relay is not mistaken for an outage

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::config::DownstreamConfig;
use crate::http::request::X_REQUEST_ID;

/// Failure to obtain a complete response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("invalid target '{0}'")]
    InvalidTarget(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(String),

    /// The dependency answered, but the body is over the relay limit.
    #[error("response body with status {status} exceeds {limit} bytes")]
    BodyTooLarge { status: StatusCode, limit: usize },
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct DownstreamRequest {
    pub method: Method,
    pub target: String,
    pub request_id: Option<String>,
}

impl DownstreamRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// A complete downstream response.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl DownstreamResponse {
    /// Plain-text response, mostly for tests and fault injection.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(HeaderValue::from_static("text/plain; charset=utf-8")),
            body: Bytes::from(body.into()),
        }
    }
}

/// Request/response call abstraction for dependencies.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn call(&self, request: DownstreamRequest) -> Result<DownstreamResponse, TransportError>;
}

/// HTTP downstream backed by the hyper legacy client.
#[derive(Clone)]
pub struct HttpDownstream {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpDownstream {
    pub fn new(config: &DownstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<DownstreamResponse, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let mut stream = Body::new(body).into_data_stream();
        let mut buffered = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Body(e.to_string()))?;
            if buffered.len() + chunk.len() > self.max_body_bytes {
                return Err(TransportError::BodyTooLarge {
                    status: parts.status,
                    limit: self.max_body_bytes,
                });
            }
            buffered.extend_from_slice(&chunk);
        }

        Ok(DownstreamResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body: Bytes::from(buffered),
        })
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn call(&self, request: DownstreamRequest) -> Result<DownstreamResponse, TransportError> {
        let uri: Uri = request
            .target
            .parse()
            .map_err(|_| TransportError::InvalidTarget(request.target.clone()))?;

        let mut builder = Request::builder()
            .method(request.method)
            .uri(uri)
            .header(header::USER_AGENT, "breaker-gateway");
        if let Some(id) = request.request_id.as_deref() {
            if let Ok(value) = HeaderValue::from_str(id) {
                builder = builder.header(X_REQUEST_ID, value);
            }
        }
        let outbound = builder
            .body(Body::empty())
            .map_err(|_| TransportError::InvalidTarget(request.target.clone()))?;

        match time::timeout(self.request_timeout, self.send(outbound)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.request_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(request_timeout_ms: u64, max_body_bytes: usize) -> DownstreamConfig {
        DownstreamConfig {
            connect_timeout_ms: 200,
            request_timeout_ms,
            max_body_bytes,
        }
    }

    /// Serve one canned HTTP/1.1 response per connection, after `delay`.
    async fn serve(response: String, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/hello", addr)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn test_buffers_body_and_content_type() {
        let target = serve(ok_response("Hello from Service B"), Duration::ZERO).await;
        let downstream = HttpDownstream::new(&config(1000, 1024));

        let response = downstream.call(DownstreamRequest::get(target)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"Hello from Service B");
        assert_eq!(response.content_type.unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_slow_dependency_times_out() {
        let target = serve(ok_response("late"), Duration::from_millis(500)).await;
        let downstream = HttpDownstream::new(&config(100, 1024));

        let result = downstream.call(DownstreamRequest::get(target)).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Bind then drop to get a port with no listener.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let downstream = HttpDownstream::new(&config(1000, 1024));

        let result = downstream
            .call(DownstreamRequest::get(format!("http://{}/hello", addr)))
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_oversized_body_keeps_status() {
        let body = "x".repeat(4096);
        let target = serve(ok_response(&body), Duration::ZERO).await;
        let downstream = HttpDownstream::new(&config(1000, 1024));

        let result = downstream.call(DownstreamRequest::get(target)).await;
        assert!(matches!(
            result,
            Err(TransportError::BodyTooLarge { status, limit: 1024 }) if status == StatusCode::OK
        ));
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let downstream = HttpDownstream::new(&config(1000, 1024));
        let result = downstream.call(DownstreamRequest::get("not a uri")).await;
        assert!(matches!(result, Err(TransportError::InvalidTarget(_))));
    }
}
