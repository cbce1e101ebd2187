//! Trait definition for the artifacts module.

use async_trait::async_trait;
use image::DynamicImage;

use super::error::ArtifactError;
use super::types::StoredArtifact;

/// The narrow store interface the job orchestrator depends on.
///
/// Upload handling, downloads and TTL cleanup are concerns of the concrete
/// store and the web boundary, not of job processing.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Looks up an artifact by id.
    async fn resolve(&self, artifact_id: &str) -> Result<StoredArtifact, ArtifactError>;

    /// Persists a job's output image, returning its public URL path.
    async fn persist_result(
        &self,
        job_id: &str,
        image: &DynamicImage,
    ) -> Result<String, ArtifactError>;
}
