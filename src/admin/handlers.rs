use axum::{extract::State, Json};
use serde::Serialize;

use crate::gateway::DependencyStatus;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub dependencies: usize,
    pub shared_store_enabled: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        dependencies: state.gateway.registry().len(),
        shared_store_enabled: state.config.shared_store.enabled,
    })
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<DependencyStatus>> {
    Json(state.gateway.status().await)
}
