//! Health check endpoints for liveness probes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::state::{AppState, ComponentInfo};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentInfo>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Always 200 while the process serves requests. Cache backends are reported
/// but never fail the check, since the proxy keeps working without them.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        components: Some(state.components),
    };

    (StatusCode::OK, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}
