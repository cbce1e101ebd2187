//! Error types for the artifacts module.

use thiserror::Error;

/// Errors that can occur in the artifact store.
///
/// Display strings are shown to clients (and recorded on failed jobs), so
/// they name artifacts by id, never by filesystem path.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No artifact with this id.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Upload had no bytes.
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// Upload exceeds the configured cap.
    #[error("Upload exceeds the {limit_bytes} byte limit")]
    TooLarge { limit_bytes: u64 },

    /// Content type not in the allow-list.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Bytes did not decode as an image.
    #[error("Uploaded file is not a valid image")]
    InvalidImage,

    /// Result image could not be encoded for storage.
    #[error("Failed to encode result image")]
    EncodeFailed(#[source] image::ImageError),

    /// Sidecar metadata was unreadable.
    #[error("Artifact metadata is corrupt: {0}")]
    CorruptMetadata(String),

    /// Underlying filesystem failure.
    #[error("Storage I/O error")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Whether this maps to a client mistake (vs a server-side failure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::EmptyUpload
                | Self::TooLarge { .. }
                | Self::UnsupportedMediaType(_)
                | Self::InvalidImage
        )
    }
}
