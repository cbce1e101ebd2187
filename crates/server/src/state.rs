use std::sync::Arc;
use std::time::Instant;

use chroma_core::{Config, FsArtifactStore, JobOrchestrator, OpsEngine, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<OpsEngine>,
    store: Arc<FsArtifactStore>,
    orchestrator: Arc<JobOrchestrator>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<OpsEngine>,
        store: Arc<FsArtifactStore>,
        orchestrator: Arc<JobOrchestrator>,
    ) -> Self {
        Self {
            config,
            engine,
            store,
            orchestrator,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &Arc<OpsEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<FsArtifactStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.orchestrator
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
