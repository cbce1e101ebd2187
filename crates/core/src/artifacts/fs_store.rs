//! Filesystem-backed artifact store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

use super::error::ArtifactError;
use super::traits::ArtifactStore;
use super::types::{ArtifactMetadata, StoredArtifact};

const UPLOADS_DIR: &str = "uploads";
const PREVIEWS_DIR: &str = "previews";
const RESULTS_DIR: &str = "results";
const METADATA_SUFFIX: &str = ".json";

const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Filesystem artifact store with TTL-based expiry.
pub struct FsArtifactStore {
    config: StorageConfig,
}

impl FsArtifactStore {
    /// Creates the store and its directory layout.
    pub async fn new(config: StorageConfig) -> Result<Self, ArtifactError> {
        let store = Self { config };
        for dir in [store.uploads_dir(), store.previews_dir(), store.results_dir()] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.config.max_upload_bytes
    }

    fn uploads_dir(&self) -> PathBuf {
        self.config.root.join(UPLOADS_DIR)
    }

    fn previews_dir(&self) -> PathBuf {
        self.config.root.join(PREVIEWS_DIR)
    }

    fn results_dir(&self) -> PathBuf {
        self.config.root.join(RESULTS_DIR)
    }

    fn extension_for(content_type: &str) -> &'static str {
        match content_type {
            "image/jpeg" | "image/jpg" => ".jpg",
            "image/webp" => ".webp",
            _ => ".png",
        }
    }

    async fn write_metadata(
        dir: &Path,
        key: &str,
        metadata: &ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| ArtifactError::CorruptMetadata(e.to_string()))?;
        fs::write(dir.join(format!("{key}{METADATA_SUFFIX}")), json).await?;
        Ok(())
    }

    async fn load_metadata(dir: &Path, key: &str) -> Result<ArtifactMetadata, ArtifactError> {
        let path = dir.join(format!("{key}{METADATA_SUFFIX}"));
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(key.to_string()))
            }
            Err(e) => return Err(ArtifactError::Io(e)),
        };
        serde_json::from_str(&json).map_err(|e| ArtifactError::CorruptMetadata(e.to_string()))
    }

    /// Validates and stores an uploaded image.
    pub async fn save_upload(
        &self,
        original_filename: Option<&str>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredArtifact, ArtifactError> {
        if bytes.is_empty() {
            return Err(ArtifactError::EmptyUpload);
        }
        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(ArtifactError::TooLarge {
                limit_bytes: self.config.max_upload_bytes,
            });
        }
        if !ALLOWED_MIME.contains(&content_type) {
            return Err(ArtifactError::UnsupportedMediaType(content_type.to_string()));
        }
        // Reject payloads that only claim to be images.
        if image::load_from_memory(&bytes).is_err() {
            return Err(ArtifactError::InvalidImage);
        }

        let id = Uuid::new_v4().simple().to_string();
        let saved_filename = format!("{id}{}", Self::extension_for(content_type));
        let path = self.uploads_dir().join(&saved_filename);
        let size = bytes.len() as u64;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let created_at = Utc::now();

        fs::write(&path, &bytes).await?;

        let metadata = ArtifactMetadata {
            id: id.clone(),
            filename: original_filename.unwrap_or(&saved_filename).to_string(),
            saved_filename: saved_filename.clone(),
            content_type: content_type.to_string(),
            size,
            sha256,
            created_at,
        };
        Self::write_metadata(&self.uploads_dir(), &id, &metadata).await?;

        debug!(artifact_id = %id, size, "stored upload");

        Ok(StoredArtifact {
            id,
            path,
            filename: metadata.filename,
            content_type: metadata.content_type,
            size,
            created_at,
            url: format!("/media/{UPLOADS_DIR}/{saved_filename}"),
        })
    }

    /// Stores a downscaled preview image, returning its public URL path.
    pub async fn save_preview(
        &self,
        artifact_id: &str,
        image: &DynamicImage,
    ) -> Result<String, ArtifactError> {
        let key = format!("{artifact_id}_preview");
        let saved_filename = format!("{key}.png");
        let path = self.previews_dir().join(&saved_filename);

        let to_encode = image.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let mut buf = Cursor::new(Vec::new());
            to_encode
                .write_to(&mut buf, ImageFormat::Png)
                .map(|_| buf.into_inner())
        })
        .await
        .map_err(|e| {
            ArtifactError::Io(std::io::Error::other(format!("encode task failed: {e}")))
        })?
        .map_err(ArtifactError::EncodeFailed)?;

        let size = encoded.len() as u64;
        let sha256 = format!("{:x}", Sha256::digest(&encoded));
        fs::write(&path, &encoded).await?;

        let metadata = ArtifactMetadata {
            id: key.clone(),
            filename: saved_filename.clone(),
            saved_filename: saved_filename.clone(),
            content_type: "image/png".to_string(),
            size,
            sha256,
            created_at: Utc::now(),
        };
        Self::write_metadata(&self.previews_dir(), &key, &metadata).await?;

        Ok(format!("/media/{PREVIEWS_DIR}/{saved_filename}"))
    }

    /// Resolves a completed job's output file for download.
    pub async fn result_path(&self, job_id: &str) -> Result<PathBuf, ArtifactError> {
        let metadata = Self::load_metadata(&self.results_dir(), job_id).await?;
        let path = self.results_dir().join(&metadata.saved_filename);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ArtifactError::NotFound(job_id.to_string()));
        }
        Ok(path)
    }

    /// Removes artifacts older than the configured TTL. Returns how many
    /// files were deleted.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize, ArtifactError> {
        let threshold = now - Duration::hours(self.config.ttl_hours as i64);
        let mut removed = 0usize;

        for dir in [self.uploads_dir(), self.previews_dir(), self.results_dir()] {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let metadata = match Self::load_metadata(&dir, key).await {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(?path, error = %e, "skipping unreadable sidecar");
                        continue;
                    }
                };
                if metadata.created_at >= threshold {
                    continue;
                }
                let image_path = dir.join(&metadata.saved_filename);
                if fs::remove_file(&image_path).await.is_ok() {
                    removed += 1;
                }
                let _ = fs::remove_file(&path).await;
            }
        }

        if removed > 0 {
            info!(removed, "expired artifacts removed");
        }
        Ok(removed)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn resolve(&self, artifact_id: &str) -> Result<StoredArtifact, ArtifactError> {
        let metadata = Self::load_metadata(&self.uploads_dir(), artifact_id).await?;
        let path = self.uploads_dir().join(&metadata.saved_filename);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ArtifactError::NotFound(artifact_id.to_string()));
        }
        Ok(StoredArtifact {
            id: metadata.id,
            path,
            filename: metadata.filename,
            content_type: metadata.content_type,
            size: metadata.size,
            created_at: metadata.created_at,
            url: format!("/media/{UPLOADS_DIR}/{}", metadata.saved_filename),
        })
    }

    async fn persist_result(
        &self,
        job_id: &str,
        image: &DynamicImage,
    ) -> Result<String, ArtifactError> {
        let saved_filename = format!("{job_id}.png");
        let path = self.results_dir().join(&saved_filename);

        // PNG encoding is CPU work; keep it off the async scheduler.
        let to_encode = image.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let mut buf = Cursor::new(Vec::new());
            to_encode
                .write_to(&mut buf, ImageFormat::Png)
                .map(|_| buf.into_inner())
        })
        .await
        .map_err(|e| {
            ArtifactError::Io(std::io::Error::other(format!("encode task failed: {e}")))
        })?
        .map_err(ArtifactError::EncodeFailed)?;

        let size = encoded.len() as u64;
        let sha256 = format!("{:x}", Sha256::digest(&encoded));
        fs::write(&path, &encoded).await?;

        let metadata = ArtifactMetadata {
            id: job_id.to_string(),
            filename: saved_filename.clone(),
            saved_filename: saved_filename.clone(),
            content_type: "image/png".to_string(),
            size,
            sha256,
            created_at: Utc::now(),
        };
        Self::write_metadata(&self.results_dir(), job_id, &metadata).await?;

        debug!(job_id, size, "stored result");
        Ok(format!("/media/{RESULTS_DIR}/{saved_filename}"))
    }
}
