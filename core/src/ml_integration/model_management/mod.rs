//! Model Management Module
//!
//! Artifact storage and the model registry, plus the helpers that build both
//! from [`Settings`].

pub mod artifacts;
pub mod memory;
pub mod registry;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::error::RegistryError;

// Re-export key types
pub use artifacts::{ArtifactRef, ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
pub use memory::InMemoryRegistry;
pub use registry::ModelRegistry;
pub use sqlite::SqliteRegistry;

const MEMORY_URL: &str = "memory://";
const SQLITE_SCHEME: &str = "sqlite://";

/// Filesystem artifact store rooted at `ARTIFACT_ROOT`.
pub fn artifact_store_from_settings(settings: &Settings) -> Arc<dyn ArtifactStore> {
    Arc::new(FsArtifactStore::new(settings.artifact_root.clone()))
}

/// Registry backend selected by `REGISTRY_URL`: `memory://` or `sqlite://<path>`.
pub async fn registry_from_settings(
    settings: &Settings,
    artifacts: Arc<dyn ArtifactStore>,
) -> Result<Arc<dyn ModelRegistry>, RegistryError> {
    let url = settings.registry_url.as_str();
    if url == MEMORY_URL {
        info!("Using in-memory model registry");
        return Ok(Arc::new(InMemoryRegistry::new(artifacts)));
    }

    let path = url.strip_prefix(SQLITE_SCHEME).ok_or_else(|| {
        RegistryError::Backend(format!("unsupported registry url '{}'", url))
    })?;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !path.starts_with(':') {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RegistryError::Backend(format!("{}: {}", parent.display(), e)))?;
        }
    }

    Ok(Arc::new(SqliteRegistry::connect(url, artifacts).await?))
}
