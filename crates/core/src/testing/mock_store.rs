//! Mock artifact store for testing.

use async_trait::async_trait;
use chrono::Utc;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::artifacts::{ArtifactError, ArtifactStore, StoredArtifact};

/// Mock implementation of the [`ArtifactStore`] trait.
///
/// Artifacts are registered by id; nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    artifacts: Arc<RwLock<HashMap<String, PathBuf>>>,
    persisted: Arc<RwLock<Vec<(String, String)>>>,
    persist_error: Arc<RwLock<Option<String>>>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an artifact id the store will resolve.
    pub async fn add_artifact(&self, id: &str) {
        self.artifacts
            .write()
            .await
            .insert(id.to_string(), PathBuf::from(format!("/mock/{id}.png")));
    }

    /// `(job_id, url)` pairs persisted so far.
    pub async fn persisted(&self) -> Vec<(String, String)> {
        self.persisted.read().await.clone()
    }

    /// The next `persist_result` calls will fail with this reason.
    pub async fn fail_persist(&self, reason: &str) {
        *self.persist_error.write().await = Some(reason.to_string());
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn resolve(&self, artifact_id: &str) -> Result<StoredArtifact, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        let path = artifacts
            .get(artifact_id)
            .ok_or_else(|| ArtifactError::NotFound(artifact_id.to_string()))?;
        Ok(StoredArtifact {
            id: artifact_id.to_string(),
            path: path.clone(),
            filename: format!("{artifact_id}.png"),
            content_type: "image/png".to_string(),
            size: 64,
            created_at: Utc::now(),
            url: format!("/media/uploads/{artifact_id}.png"),
        })
    }

    async fn persist_result(
        &self,
        job_id: &str,
        _image: &DynamicImage,
    ) -> Result<String, ArtifactError> {
        if let Some(reason) = self.persist_error.read().await.clone() {
            return Err(ArtifactError::Io(std::io::Error::other(reason)));
        }
        let url = format!("/media/results/{job_id}.png");
        self.persisted
            .write()
            .await
            .push((job_id.to_string(), url.clone()));
        Ok(url)
    }
}
