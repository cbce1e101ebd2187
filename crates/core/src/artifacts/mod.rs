//! Artifact storage.
//!
//! Uploaded images, previews and job results live on the filesystem under a
//! configurable root, each with a JSON metadata sidecar. Artifacts expire
//! after a TTL; the cleanup pass runs at startup and periodically.

mod error;
mod fs_store;
mod traits;
mod types;

pub use error::ArtifactError;
pub use fs_store::FsArtifactStore;
pub use traits::ArtifactStore;
pub use types::{ArtifactMetadata, StoredArtifact};
