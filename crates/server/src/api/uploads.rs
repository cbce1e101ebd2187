//! Image upload handler.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use chroma_core::ArtifactError;

use super::ErrorResponse;
use crate::metrics::UPLOADS_TOTAL;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub url: String,
}

/// Accepts a multipart upload with a single `file` field.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ErrorResponse>)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("Malformed multipart body: {e}"))),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Failed to read upload: {e}"))),
            )
        })?;

        let stored = state
            .store()
            .save_upload(filename.as_deref(), &content_type, bytes.to_vec())
            .await
            .map_err(artifact_error)?;

        UPLOADS_TOTAL.inc();

        return Ok(Json(UploadResponse {
            image_id: stored.id,
            filename: stored.filename,
            content_type: stored.content_type,
            size: stored.size,
            url: stored.url,
        }));
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Missing 'file' field")),
    ))
}

fn artifact_error(error: ArtifactError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        ArtifactError::NotFound(_) => StatusCode::NOT_FOUND,
        ArtifactError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(error.to_string())))
}
