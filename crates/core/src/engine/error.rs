//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during image processing.
///
/// Display strings double as user-facing failure messages on jobs, so they
/// must not leak filesystem paths or internals.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation id is not in the registry.
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    /// A parameter failed validation.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// The operation needs a reference image and none was provided.
    #[error("Operation '{0}' requires a reference image")]
    ReferenceRequired(String),

    /// Source image could not be decoded.
    #[error("Failed to load source image")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Result image could not be encoded.
    #[error("Failed to encode result image")]
    EncodeFailed {
        #[source]
        source: image::ImageError,
    },

    /// The pixel work itself failed.
    #[error("Operation failed: {reason}")]
    OperationFailed { reason: String },
}
