use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by the CORS layer. Empty list disables CORS headers.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for uploads, previews and results.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Artifacts older than this are removed by the cleanup pass.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
    /// Upload size cap in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            ttl_hours: default_ttl_hours(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_ttl_hours() -> u32 {
    72
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

/// Image engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Previews are downscaled to at most this width before processing.
    #[serde(default = "default_preview_max_width")]
    pub preview_max_width: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_max_width: default_preview_max_width(),
        }
    }
}

fn default_preview_max_width() -> u32 {
    640
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: SanitizedStorageConfig,
    pub engine: EngineConfig,
}

/// Storage config with the filesystem root redacted
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub ttl_hours: u32,
    pub max_upload_bytes: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: SanitizedStorageConfig {
                ttl_hours: config.storage.ttl_hours,
                max_upload_bytes: config.storage.max_upload_bytes,
            },
            engine: config.engine.clone(),
        }
    }
}
