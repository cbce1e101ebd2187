//! Job status and result download handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use std::sync::Arc;

use chroma_core::{ArtifactError, JobError, JobSnapshot};

use super::ErrorResponse;
use crate::state::AppState;

/// Point-in-time job snapshot.
pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    match state.orchestrator().status(&job_id).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(JobError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Job not found: {job_id}"))),
        )),
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub job_id: String,
    pub b64: String,
}

/// Completed result as base64 JSON.
pub async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<DownloadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let path = state
        .store()
        .result_path(&job_id)
        .await
        .map_err(|error| match &error {
            ArtifactError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(error.to_string())),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(error.to_string())),
            ),
        })?;

    let bytes = tokio::fs::read(&path).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to read result file")),
        )
    })?;

    Ok(Json(DownloadResponse {
        job_id,
        b64: BASE64.encode(bytes),
    }))
}
