//! Types for the artifacts module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A resolved artifact on disk.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Opaque artifact id.
    pub id: String,
    /// Absolute path to the image file.
    pub path: PathBuf,
    /// Original filename as uploaded.
    pub filename: String,
    /// MIME type as uploaded.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub created_at: DateTime<Utc>,
    /// Public URL path under `/media`.
    pub url: String,
}

/// JSON sidecar persisted next to every artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: String,
    pub filename: String,
    pub saved_filename: String,
    pub content_type: String,
    pub size: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}
