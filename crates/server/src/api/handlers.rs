use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use chroma_core::{list_operations, OperationSpec, SanitizedConfig};

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: f64,
    pub jobs_in_queue: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        jobs_in_queue: state.orchestrator().job_count().await,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Operation registry for the frontend.
///
/// Wrapped in an object with an `ops` key so the response stays extensible.
#[derive(Serialize)]
pub struct RegistryResponse {
    pub ops: Vec<OperationSpec>,
}

pub async fn ops_registry() -> Json<RegistryResponse> {
    Json(RegistryResponse {
        ops: list_operations(),
    })
}

pub async fn metrics() -> String {
    encode_metrics()
}
