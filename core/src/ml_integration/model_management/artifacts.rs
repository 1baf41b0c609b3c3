//! Run Artifact Storage
//!
//! Artifacts are addressed as `runs:/<run_id>/<path>`, which keeps every
//! stored model traceable to the training run that produced it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ArtifactError;

const SCHEME: &str = "runs:/";

/// Reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(run_id: &str, path: &str) -> Self {
        Self(format!("{}{}/{}", SCHEME, run_id, path))
    }

    /// Parse a `runs:/<run_id>/<path>` string.
    pub fn parse(value: &str) -> Result<Self, ArtifactError> {
        let artifact = Self(value.to_string());
        artifact.parts()?;
        Ok(artifact)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(run_id, path)` components.
    pub fn parts(&self) -> Result<(&str, &str), ArtifactError> {
        let invalid = || ArtifactError::InvalidReference(self.0.clone());
        let rest = self.0.strip_prefix(SCHEME).ok_or_else(invalid)?;
        let (run_id, path) = rest.split_once('/').ok_or_else(invalid)?;
        let escapes = Path::new(path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if run_id.is_empty() || path.is_empty() || run_id.contains("..") || escapes {
            return Err(invalid());
        }
        Ok((run_id, path))
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for immutable run artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `path` for `run_id`. Existing artifacts are never
    /// overwritten.
    async fn put(&self, run_id: &str, path: &str, bytes: Vec<u8>)
        -> Result<ArtifactRef, ArtifactError>;

    async fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ArtifactError>;
}

/// Filesystem store rooted at a directory; `runs:/<run>/<path>` maps to
/// `<root>/<run>/<path>`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn location(&self, artifact: &ArtifactRef) -> Result<PathBuf, ArtifactError> {
        let (run_id, path) = artifact.parts()?;
        Ok(self.root.join(run_id).join(path))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        run_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError> {
        let artifact = ArtifactRef::new(run_id, path);
        let location = self.location(&artifact)?;
        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&location)
            .await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &bytes).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;

        debug!("Stored artifact {} ({} bytes)", artifact, bytes.len());
        Ok(artifact)
    }

    async fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ArtifactError> {
        let location = self.location(artifact)?;
        match tokio::fs::read(&location).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(artifact.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, used by tests and the `memory://` registry.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<HashMap<ArtifactRef, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        run_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError> {
        let artifact = ArtifactRef::new(run_id, path);
        artifact.parts()?;
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(&artifact) {
            return Err(ArtifactError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("artifact {} already exists", artifact),
            )));
        }
        blobs.insert(artifact.clone(), bytes);
        Ok(artifact)
    }

    async fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ArtifactError> {
        self.blobs
            .read()
            .await
            .get(artifact)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(artifact.to_string()))
    }
}
