//! Common test utilities for in-process API testing.
//!
//! The fixture builds the real router over a real engine and a
//! filesystem store rooted in a temp directory, so tests exercise the full
//! stack without binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use chroma_core::{
    ArtifactStore, Config, FsArtifactStore, ImageEngine, JobOrchestrator, OpsEngine,
};
use chroma_server::api::create_router;
use chroma_server::state::AppState;

/// Test fixture with an in-process router and its backing store.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<FsArtifactStore>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.storage.root = temp_dir.path().to_path_buf();

        let store = Arc::new(
            FsArtifactStore::new(config.storage.clone())
                .await
                .expect("Failed to create store"),
        );
        let engine = Arc::new(OpsEngine::new(config.engine.preview_max_width));
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&engine) as Arc<dyn ImageEngine>,
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
        ));

        let state = Arc::new(AppState::new(
            config,
            engine,
            Arc::clone(&store),
            orchestrator,
        ));
        let router = create_router(state);

        Self {
            router,
            store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Uploads PNG bytes through the multipart endpoint, returning the
    /// response.
    pub async fn upload_png(&self, filename: &str, bytes: Vec<u8>) -> TestResponse {
        let boundary = "chroma-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Uploads a uniform-gray square and returns its image id.
    pub async fn upload_gray_image(&self, side: u32, value: u8) -> String {
        let response = self
            .upload_png("gray.png", gray_png(side, value))
            .await;
        assert_eq!(response.status, StatusCode::OK, "upload failed: {:?}", response.body);
        response.body["image_id"]
            .as_str()
            .expect("missing image_id")
            .to_string()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }
}

/// Encodes a uniform-gray RGBA square as PNG bytes.
pub fn gray_png(side: u32, value: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        side,
        side,
        Rgba([value, value, value, 255]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
