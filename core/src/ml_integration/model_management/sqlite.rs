//! SQLite registry backend.
//!
//! Registered models and versions live in two tables. Every multi-statement
//! mutation runs in one transaction, which is what makes a promotion with
//! `archive_others` an atomic swap of the stage holder.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::ml_integration::metadata::{ModelStage, ModelVersion, RegisteredModel};
use crate::ml_integration::model_management::registry::load_pipeline;
use crate::ml_integration::model_management::{ArtifactRef, ArtifactStore, ModelRegistry};
use crate::ml_integration::pipeline::SurvivalPipeline;

const CREATE_MODELS_TABLE: &str = "CREATE TABLE IF NOT EXISTS registered_models (
    name TEXT PRIMARY KEY NOT NULL,
    created_at TEXT NOT NULL
)";

const CREATE_VERSIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS model_versions (
    name TEXT NOT NULL REFERENCES registered_models(name),
    version INTEGER NOT NULL,
    artifact_ref TEXT NOT NULL,
    run_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (name, version)
)";

const VERSION_COLUMNS: &str =
    "name, version, artifact_ref, run_id, stage, created_at, updated_at";

pub struct SqliteRegistry {
    pool: SqlitePool,
    artifacts: Arc<dyn ArtifactStore>,
}

impl SqliteRegistry {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://mlruns/registry.db`.
    pub async fn connect(url: &str, artifacts: Arc<dyn ArtifactStore>) -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!("Connected to registry database: {}", url);
        Self::with_pool(pool, artifacts).await
    }

    /// A private in-memory database, kept alive by a single pooled connection.
    pub async fn in_memory(artifacts: Arc<dyn ArtifactStore>) -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool, artifacts).await
    }

    async fn with_pool(
        pool: SqlitePool,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self, RegistryError> {
        sqlx::query(CREATE_MODELS_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_VERSIONS_TABLE).execute(&pool).await?;
        Ok(Self { pool, artifacts })
    }

    async fn model_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, RegistryError> {
        let row = sqlx::query("SELECT 1 FROM registered_models WHERE name = ?")
            .bind(name)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }

    async fn require_model(&self, name: &str) -> Result<(), RegistryError> {
        let mut conn = self.pool.acquire().await?;
        if Self::model_exists(&mut conn, name).await? {
            Ok(())
        } else {
            Err(RegistryError::NotFound(name.to_string()))
        }
    }
}

fn version_from_row(row: &SqliteRow) -> Result<ModelVersion, RegistryError> {
    let version: i64 = row.try_get("version")?;
    let stage: String = row.try_get("stage")?;
    let artifact: String = row.try_get("artifact_ref")?;

    Ok(ModelVersion {
        name: row.try_get("name")?,
        version: u32::try_from(version)
            .map_err(|_| RegistryError::Backend(format!("invalid version number {}", version)))?,
        artifact: ArtifactRef::parse(&artifact)?,
        run_id: row.try_get("run_id")?,
        stage: stage.parse().map_err(RegistryError::Backend)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ModelRegistry for SqliteRegistry {
    async fn get_by_name(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        debug!("Looking up registered model: {}", name);
        let row = sqlx::query("SELECT name, created_at FROM registered_models WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM model_versions WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

        Ok(RegisteredModel {
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            latest_version: latest.and_then(|v| u32::try_from(v).ok()),
        })
    }

    async fn create(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        let mut tx = self.pool.begin().await?;
        if Self::model_exists(&mut tx, name).await? {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        let created_at = Utc::now();
        sqlx::query("INSERT INTO registered_models (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Created registered model: {}", name);
        Ok(RegisteredModel {
            name: name.to_string(),
            created_at,
            latest_version: None,
        })
    }

    async fn add_version(
        &self,
        name: &str,
        artifact: &ArtifactRef,
        run_id: &str,
    ) -> Result<ModelVersion, RegistryError> {
        let mut tx = self.pool.begin().await?;
        if !Self::model_exists(&mut tx, name).await? {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        let latest: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM model_versions WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        let version = latest + 1;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO model_versions
                (name, version, artifact_ref, run_id, stage, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(version)
        .bind(artifact.as_str())
        .bind(run_id)
        .bind(ModelStage::None.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Registered {} version {}", name, version);
        Ok(ModelVersion {
            name: name.to_string(),
            version: u32::try_from(version)
                .map_err(|_| RegistryError::Backend(format!("invalid version number {}", version)))?,
            artifact: artifact.clone(),
            run_id: run_id.to_string(),
            stage: ModelStage::None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_others: bool,
    ) -> Result<(), RegistryError> {
        let mut tx = self.pool.begin().await?;
        let found = sqlx::query("SELECT 1 FROM model_versions WHERE name = ? AND version = ?")
            .bind(name)
            .bind(i64::from(version))
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !found {
            return Err(if Self::model_exists(&mut tx, name).await? {
                RegistryError::VersionNotFound {
                    name: name.to_string(),
                    version,
                }
            } else {
                RegistryError::NotFound(name.to_string())
            });
        }

        let now = Utc::now();
        if archive_others {
            sqlx::query(
                "UPDATE model_versions SET stage = ?, updated_at = ?
                 WHERE name = ? AND stage = ? AND version <> ?",
            )
            .bind(ModelStage::Archived.as_str())
            .bind(now)
            .bind(name)
            .bind(stage.as_str())
            .bind(i64::from(version))
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "UPDATE model_versions SET stage = ?, updated_at = ? WHERE name = ? AND version = ?",
        )
        .bind(stage.as_str())
        .bind(now)
        .bind(name)
        .bind(i64::from(version))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Moved {} version {} to {}", name, version, stage);
        Ok(())
    }

    async fn get_version_by_stage(
        &self,
        name: &str,
        stage: ModelStage,
    ) -> Result<Option<ModelVersion>, RegistryError> {
        self.require_model(name).await?;
        let query = format!(
            "SELECT {} FROM model_versions WHERE name = ? AND stage = ?
             ORDER BY version DESC LIMIT 1",
            VERSION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(name)
            .bind(stage.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(version_from_row).transpose()
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        self.require_model(name).await?;
        let query = format!(
            "SELECT {} FROM model_versions WHERE name = ? ORDER BY version ASC",
            VERSION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(version_from_row).collect()
    }

    async fn load_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> Result<SurvivalPipeline, RegistryError> {
        load_pipeline(&self.artifacts, artifact).await
    }
}
