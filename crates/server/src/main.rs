use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chroma_core::{
    load_config, validate_config, ArtifactStore, Config, FsArtifactStore, ImageEngine,
    JobOrchestrator, OpsEngine,
};

use chroma_server::api::create_router;
use chroma_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often expired artifacts are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CHROMA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; a missing file means defaults plus env overrides
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults", config_path);
        Config::default()
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Chroma {} starting", VERSION);
    info!("Storage root: {:?}", config.storage.root);

    // Create artifact store
    let store = Arc::new(
        FsArtifactStore::new(config.storage.clone())
            .await
            .context("Failed to create artifact store")?,
    );
    info!("Artifact store initialized");

    // Sweep expired artifacts at startup, then periodically
    match store.cleanup_expired(Utc::now()).await {
        Ok(removed) if removed > 0 => info!("Startup cleanup removed {} artifacts", removed),
        Ok(_) => {}
        Err(e) => warn!("Startup cleanup failed: {}", e),
    }
    spawn_cleanup_task(Arc::clone(&store));

    // Create engine
    let engine = Arc::new(OpsEngine::new(config.engine.preview_max_width));
    info!("Image engine initialized: {}", engine.name());

    // Create the job orchestrator; a single instance owned here and injected
    // into every handler through the app state.
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&engine) as Arc<dyn ImageEngine>,
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
    ));
    info!("Job orchestrator initialized");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        engine,
        Arc::clone(&store),
        orchestrator,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    Ok(())
}

/// Periodic TTL sweep over the artifact store.
fn spawn_cleanup_task(store: Arc<FsArtifactStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The startup sweep already ran; skip the immediate tick.
        interval.tick().await;
        loop {
            interval.tick().await;
            match store.cleanup_expired(Utc::now()).await {
                Ok(removed) if removed > 0 => {
                    info!("Cleanup removed {} expired artifacts", removed)
                }
                Ok(_) => {}
                Err(e) => warn!("Cleanup failed: {}", e),
            }
        }
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
