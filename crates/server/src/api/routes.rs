use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{handlers, jobs, process, uploads, ws};
use crate::api::middleware::{metrics_middleware, security_headers_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config().server.cors_origins);
    // Leave headroom over the store's own cap so the store produces the
    // user-facing "too large" error instead of a bare 413.
    let body_limit = state.config().storage.max_upload_bytes as usize + 1024 * 1024;
    let media_dir = state.store().root().to_path_buf();

    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Operation registry (and legacy alias)
        .route("/ops/registry", get(handlers::ops_registry))
        .route("/operations", get(handlers::ops_registry))
        // Uploads
        .route("/upload", post(uploads::upload_image))
        // Transformations
        .route("/preview", post(process::preview_image))
        .route("/process", post(process::process_image))
        // Jobs
        .route("/jobs/{job_id}", get(jobs::get_job_status))
        .route("/download/{job_id}", get(jobs::download_result))
        .route("/progress/{job_id}", get(ws::progress_ws))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        // Serve all artifacts from the storage root: /media/uploads,
        // /media/previews, /media/results.
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_DISPOSITION])
}
