pub mod artifacts;
pub mod config;
pub mod engine;
pub mod jobs;
pub mod testing;

pub use artifacts::{ArtifactError, ArtifactStore, FsArtifactStore, StoredArtifact};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineConfig,
    SanitizedConfig, ServerConfig, StorageConfig,
};
pub use engine::{
    canonical_operation_id, list_operations, prepare_params, requires_reference, EngineError,
    ImageEngine, MetricMap, OperationSpec, OpsEngine,
};
pub use jobs::{Job, JobError, JobOrchestrator, JobSnapshot, JobStatus, JobSubscription};
