//! Preview and process submission handlers.

use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use chroma_core::{
    canonical_operation_id, prepare_params, ArtifactError, ArtifactStore, EngineError,
    ImageEngine, JobStatus, MetricMap,
};

use super::ErrorResponse;
use crate::metrics::JOBS_SUBMITTED_TOTAL;
use crate::state::AppState;

/// Indicative only; clients poll or subscribe for real progress.
const ETA_MS: u64 = 1200;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub image_id: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub image_id: String,
    pub operation: String,
    pub result_b64: String,
    pub preview_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricMap>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub image_id: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub eta_ms: u64,
}

/// Synchronous low-resolution preview of an operation.
pub async fn preview_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stored = state
        .store()
        .resolve(&body.image_id)
        .await
        .map_err(artifact_error)?;

    let operation = canonical_operation_id(&body.operation).map_err(engine_error)?;
    let params = prepare_params(operation, &body.params).map_err(engine_error)?;

    let engine = state.engine();
    let original = engine
        .load_image(&stored.path)
        .await
        .map_err(engine_error)?;
    let (processed, operation_metrics) = engine
        .preview(original.clone(), operation, &params, None)
        .await
        .map_err(engine_error)?;

    // Comparison metrics are only meaningful when no downscale happened;
    // they come back empty on a dimension mismatch.
    let mut metrics = engine.comparison_metrics(&original, &processed).await;
    metrics.extend(operation_metrics);

    let preview_url = state
        .store()
        .save_preview(&body.image_id, &processed)
        .await
        .map_err(artifact_error)?;

    let png = engine.encode_png(&processed).map_err(engine_error)?;

    Ok(Json(PreviewResponse {
        image_id: body.image_id,
        operation: operation.to_string(),
        result_b64: BASE64.encode(png),
        preview_url,
        metrics: (!metrics.is_empty()).then_some(metrics),
    }))
}

/// Submits a full-resolution transformation job.
///
/// Validates the upload and the params synchronously, then hands off to the
/// orchestrator and returns immediately; all later failures surface through
/// the job status and the progress stream only.
pub async fn process_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stored = state
        .store()
        .resolve(&body.image_id)
        .await
        .map_err(artifact_error)?;

    let operation = canonical_operation_id(&body.operation).map_err(engine_error)?;
    let params = prepare_params(operation, &body.params).map_err(engine_error)?;

    let snapshot = state
        .orchestrator()
        .submit(stored.id, operation.to_string(), params, body.target_id)
        .await;

    JOBS_SUBMITTED_TOTAL.inc();

    Ok(Json(ProcessResponse {
        job_id: snapshot.job_id,
        status: snapshot.status,
        eta_ms: ETA_MS,
    }))
}

fn artifact_error(error: ArtifactError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        ArtifactError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(error.to_string())))
}

fn engine_error(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        EngineError::UnknownOperation(_)
        | EngineError::InvalidParam { .. }
        | EngineError::ReferenceRequired(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(error.to_string())))
}
