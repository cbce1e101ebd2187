//! Mock image engine for testing.

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{EngineError, ImageEngine, MetricMap};

/// A recorded operation call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedOperation {
    pub operation: String,
    pub params: Value,
    pub had_target: bool,
}

/// Mock implementation of the [`ImageEngine`] trait.
///
/// Controllable behavior:
/// - record applied operations for assertions
/// - inject failures per phase
/// - configure the metric maps it reports
/// - delay operations to widen the processing window
#[derive(Debug, Default)]
pub struct MockEngine {
    operations: Arc<RwLock<Vec<RecordedOperation>>>,
    comparison_metrics: Arc<RwLock<MetricMap>>,
    operation_metrics: Arc<RwLock<MetricMap>>,
    load_error: Arc<RwLock<Option<String>>>,
    apply_error: Arc<RwLock<Option<String>>>,
    apply_delay: Arc<RwLock<Option<Duration>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_operations(&self) -> Vec<RecordedOperation> {
        self.operations.read().await.clone()
    }

    pub async fn set_comparison_metrics(
        &self,
        metrics: impl IntoIterator<Item = (&'static str, f64)>,
    ) {
        *self.comparison_metrics.write().await = metrics
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
    }

    pub async fn set_operation_metrics(
        &self,
        metrics: impl IntoIterator<Item = (&'static str, f64)>,
    ) {
        *self.operation_metrics.write().await = metrics
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
    }

    /// The next `load_image` calls will fail with this reason.
    pub async fn fail_load(&self, reason: &str) {
        *self.load_error.write().await = Some(reason.to_string());
    }

    /// The next `apply_operation` calls will fail with this reason.
    pub async fn fail_apply(&self, reason: &str) {
        *self.apply_error.write().await = Some(reason.to_string());
    }

    /// Stall `apply_operation` to keep jobs observable mid-flight.
    pub async fn set_apply_delay(&self, delay: Duration) {
        *self.apply_delay.write().await = Some(delay);
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([128, 128, 128, 255]),
        ))
    }
}

#[async_trait]
impl ImageEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_image(&self, path: &Path) -> Result<DynamicImage, EngineError> {
        if let Some(reason) = self.load_error.read().await.clone() {
            return Err(EngineError::LoadFailed {
                path: PathBuf::from(path),
                source: image::ImageError::IoError(std::io::Error::other(reason)),
            });
        }
        Ok(Self::test_image())
    }

    async fn apply_operation(
        &self,
        image: DynamicImage,
        operation: &str,
        params: &Value,
        target: Option<DynamicImage>,
    ) -> Result<(DynamicImage, MetricMap), EngineError> {
        if let Some(delay) = *self.apply_delay.read().await {
            tokio::time::sleep(delay).await;
        }

        self.operations.write().await.push(RecordedOperation {
            operation: operation.to_string(),
            params: params.clone(),
            had_target: target.is_some(),
        });

        if let Some(reason) = self.apply_error.read().await.clone() {
            return Err(EngineError::OperationFailed { reason });
        }

        Ok((image, self.operation_metrics.read().await.clone()))
    }

    async fn comparison_metrics(
        &self,
        _original: &DynamicImage,
        _processed: &DynamicImage,
    ) -> MetricMap {
        self.comparison_metrics.read().await.clone()
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>, EngineError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|source| EngineError::EncodeFailed { source })?;
        Ok(buf.into_inner())
    }
}
