//! Trait definition for the engine module.

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::Value;
use std::path::Path;

use super::error::EngineError;
use super::types::MetricMap;

/// An engine that can load, transform and measure images.
///
/// Heavy pixel work is expected to run off the async scheduler (the default
/// implementation offloads to the blocking pool), so every method is a
/// suspension point for callers.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Decodes an image from disk.
    async fn load_image(&self, path: &Path) -> Result<DynamicImage, EngineError>;

    /// Applies an operation, returning the processed image together with any
    /// operation-specific metrics.
    ///
    /// `params` must already be validated via [`super::prepare_params`].
    async fn apply_operation(
        &self,
        image: DynamicImage,
        operation: &str,
        params: &Value,
        target: Option<DynamicImage>,
    ) -> Result<(DynamicImage, MetricMap), EngineError>;

    /// Computes similarity metrics between an original and a processed
    /// image. Never fails; an empty map means the comparison was not
    /// meaningful (e.g. dimensions differ).
    async fn comparison_metrics(
        &self,
        original: &DynamicImage,
        processed: &DynamicImage,
    ) -> MetricMap;

    /// Encodes an image as PNG bytes.
    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    struct NoopEngine;

    #[async_trait]
    impl ImageEngine for NoopEngine {
        fn name(&self) -> &str {
            "noop"
        }

        async fn load_image(&self, _path: &Path) -> Result<DynamicImage, EngineError> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
        }

        async fn apply_operation(
            &self,
            image: DynamicImage,
            _operation: &str,
            _params: &Value,
            _target: Option<DynamicImage>,
        ) -> Result<(DynamicImage, MetricMap), EngineError> {
            Ok((image, MetricMap::new()))
        }

        async fn comparison_metrics(
            &self,
            _original: &DynamicImage,
            _processed: &DynamicImage,
        ) -> MetricMap {
            MetricMap::new()
        }

        fn encode_png(&self, _image: &DynamicImage) -> Result<Vec<u8>, EngineError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let engine: Box<dyn ImageEngine> = Box::new(NoopEngine);
        assert_eq!(engine.name(), "noop");
        let img = engine.load_image(Path::new("/nope")).await.unwrap();
        let (out, metrics) = engine
            .apply_operation(img, "negative", &Value::Null, None)
            .await
            .unwrap();
        assert_eq!(out.width(), 2);
        assert!(metrics.is_empty());
    }
}
