//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Dispatch protected calls to the call gateway
//! - Mount the admin surface when enabled

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::GatewayConfig;
use crate::gateway::CallGateway;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};

/// Dependency served by the legacy `/call-service-b` route.
pub const LEGACY_DEPENDENCY: &str = "ServiceB";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: CallGateway,
    pub config: Arc<GatewayConfig>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    /// Create a new HTTP server around a gateway.
    pub fn new(config: GatewayConfig, gateway: CallGateway) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            gateway,
            config: config.clone(),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/call/{dependency}", get(call_handler))
            .route("/call-service-b", get(legacy_call_handler))
            .route("/health", get(health_handler));

        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        router
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            dependencies = self.config.dependencies.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Protected call to a named dependency.
async fn call_handler(
    State(state): State<AppState>,
    Path(dependency): Path<String>,
    headers: HeaderMap,
) -> Response {
    protected_call(&state, &dependency, &headers).await
}

async fn legacy_call_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    protected_call(&state, LEGACY_DEPENDENCY, &headers).await
}

async fn protected_call(state: &AppState, dependency: &str, headers: &HeaderMap) -> Response {
    let request_id = request_id(headers);
    tracing::debug!(
        request_id = request_id.as_deref().unwrap_or("unknown"),
        dependency = %dependency,
        "Protected call"
    );

    match state.gateway.call(dependency, request_id).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}
